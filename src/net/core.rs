//! 网的门面：库所、迁移、`Pre`/`Post` 矩阵与结构校验.
use std::fmt::{self, Write as FmtWrite};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::incidence::Incidence;
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::marking::{Marking, Tokens};
use crate::net::structure::{Arc, ArcDirection, Place, Transition, Weight};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetError {
    #[error("arc between {place} and {transition} has non-positive weight {weight}")]
    InvalidWeight {
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
    },
    #[error("unknown place {0}")]
    UnknownPlace(PlaceId),
    #[error("unknown transition {0}")]
    UnknownTransition(TransitionId),
    #[error("place {place} starts with negative token count {tokens}")]
    NegativeTokens { place: PlaceId, tokens: Weight },
    #[error("incidence matrices do not match {places} places and {transitions} transitions")]
    ShapeMismatch { places: usize, transitions: usize },
    #[error("name `{0}` is used by more than one node")]
    DuplicateName(String),
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Net {
    pub places: IndexVec<PlaceId, Place>,
    pub transitions: IndexVec<TransitionId, Transition>,
    pub pre: Incidence<Weight>,
    pub post: Incidence<Weight>,
}

impl fmt::Debug for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Net")
            .field("places", &self.places)
            .field("transitions", &self.transitions)
            .field("arcs", &self.arcs().collect::<Vec<_>>())
            .finish()
    }
}

impl Net {
    pub fn empty() -> Self {
        Self {
            places: IndexVec::new(),
            transitions: IndexVec::new(),
            pre: Incidence::new(0, 0, 0),
            post: Incidence::new(0, 0, 0),
        }
    }

    pub fn add_place(&mut self, place: Place) -> PlaceId {
        let place_id = self.places.push(place);
        self.pre.push_place_with_default(0);
        self.post.push_place_with_default(0);
        place_id
    }

    pub fn add_transition(&mut self, transition: Transition) -> TransitionId {
        let transition_id = self.transitions.push(transition);
        self.pre.push_transition_with_default(0);
        self.post.push_transition_with_default(0);
        transition_id
    }

    /// 输入弧: place -> transition，重复添加时权重累加。
    pub fn add_input_arc(
        &mut self,
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
    ) -> Result<(), NetError> {
        self.check_arc(place, transition, weight)?;
        self.pre.accumulate(place, transition, weight);
        Ok(())
    }

    /// 输出弧: transition -> place，重复添加时权重累加。
    pub fn add_output_arc(
        &mut self,
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
    ) -> Result<(), NetError> {
        self.check_arc(place, transition, weight)?;
        self.post.accumulate(place, transition, weight);
        Ok(())
    }

    pub fn add_arc(&mut self, arc: Arc) -> Result<(), NetError> {
        match arc.direction {
            ArcDirection::PlaceToTransition => {
                self.add_input_arc(arc.place, arc.transition, arc.weight)
            }
            ArcDirection::TransitionToPlace => {
                self.add_output_arc(arc.place, arc.transition, arc.weight)
            }
        }
    }

    fn check_arc(
        &self,
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
    ) -> Result<(), NetError> {
        if !self.places.contains_index(place) {
            return Err(NetError::UnknownPlace(place));
        }
        if !self.transitions.contains_index(transition) {
            return Err(NetError::UnknownTransition(transition));
        }
        if weight <= 0 {
            return Err(NetError::InvalidWeight {
                place,
                transition,
                weight,
            });
        }
        Ok(())
    }

    pub fn get_place(&self, place: PlaceId) -> Option<&Place> {
        self.places.get(place)
    }

    pub fn get_transition(&self, transition: TransitionId) -> Option<&Transition> {
        self.transitions.get(transition)
    }

    pub fn place_by_name(&self, name: &str) -> Option<PlaceId> {
        self.places
            .iter_enumerated()
            .find(|(_, place)| place.name == name)
            .map(|(id, _)| id)
    }

    pub fn transition_by_name(&self, name: &str) -> Option<TransitionId> {
        self.transitions
            .iter_enumerated()
            .find(|(_, transition)| transition.name == name)
            .map(|(id, _)| id)
    }

    pub fn transition_name(&self, transition: TransitionId) -> &str {
        self.transitions
            .get(transition)
            .map_or("?", |t| t.name.as_str())
    }

    pub fn places_len(&self) -> usize {
        self.places.len()
    }

    pub fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    /// 按弧展开的视图，先输入弧后输出弧。
    pub fn arcs(&self) -> impl Iterator<Item = Arc> + '_ {
        let inputs = self.transitions.indices().flat_map(move |t| {
            self.pre
                .column(t)
                .map(move |(place, weight)| Arc::input(place, t, weight))
        });
        let outputs = self.transitions.indices().flat_map(move |t| {
            self.post
                .column(t)
                .map(move |(place, weight)| Arc::output(place, t, weight))
        });
        inputs.chain(outputs)
    }

    /// 反序列化或手工拼装的网在参与搜索前必须通过此检查。
    pub fn validate(&self) -> Result<(), NetError> {
        let (places, transitions) = (self.places_len(), self.transitions_len());
        if !self.pre.has_shape(places, transitions) || !self.post.has_shape(places, transitions)
        {
            return Err(NetError::ShapeMismatch {
                places,
                transitions,
            });
        }
        for (place, info) in self.places.iter_enumerated() {
            if info.tokens < 0 {
                return Err(NetError::NegativeTokens {
                    place,
                    tokens: info.tokens,
                });
            }
        }
        for matrix in [&self.pre, &self.post] {
            for (place, row) in matrix.rows().iter_enumerated() {
                if let Some((idx, weight)) = row.iter().enumerate().find(|(_, w)| **w < 0) {
                    return Err(NetError::InvalidWeight {
                        place,
                        transition: TransitionId::from_usize(idx),
                        weight: *weight,
                    });
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        let names = self
            .places
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.transitions.iter().map(|t| t.name.as_str()));
        for name in names {
            if !seen.insert(name) {
                return Err(NetError::DuplicateName(name.to_owned()));
            }
        }
        Ok(())
    }

    pub fn initial_marking(&self) -> Marking {
        Marking::new(
            self.places
                .iter()
                .map(|p| Tokens::Finite(p.tokens))
                .collect(),
        )
    }

    pub fn incidence(&self) -> (&Incidence<Weight>, &Incidence<Weight>) {
        (&self.pre, &self.post)
    }

    pub fn c_matrix(&self) -> Incidence<Weight> {
        self.post.difference(&self.pre)
    }

    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        let _ = writeln!(&mut dot, "digraph PetriNet {{");
        let _ = writeln!(&mut dot, "    rankdir=LR;");
        let _ = writeln!(&mut dot, "    node [fontname=\"Helvetica\"];");

        for (place_id, place) in self.places.iter_enumerated() {
            let _ = writeln!(
                &mut dot,
                "    place_{} [label=\"{}\\n{}\", shape=circle, style=filled, fillcolor=\"#e3f2fd\"];",
                place_id.index(),
                escape_label(&place.name),
                place.tokens
            );
        }

        for (transition_id, transition) in self.transitions.iter_enumerated() {
            let _ = writeln!(
                &mut dot,
                "    trans_{} [label=\"{}\", shape=box, style=filled, fillcolor=\"#ffe0b2\"];",
                transition_id.index(),
                escape_label(&transition.name)
            );
        }

        for arc in self.arcs() {
            let place_node = format!("place_{}", arc.place.index());
            let transition_node = format!("trans_{}", arc.transition.index());
            let (from, to) = match arc.direction {
                ArcDirection::PlaceToTransition => (place_node, transition_node),
                ArcDirection::TransitionToPlace => (transition_node, place_node),
            };
            if arc.weight == 1 {
                let _ = writeln!(&mut dot, "    {from} -> {to};");
            } else {
                let _ = writeln!(&mut dot, "    {from} -> {to} [label=\"{}\"];", arc.weight);
            }
        }

        let _ = writeln!(&mut dot, "}}");
        dot
    }

    pub fn write_dot<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_dot())
    }
}

impl Default for Net {
    fn default() -> Self {
        Self::empty()
    }
}

pub(crate) fn escape_label(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
