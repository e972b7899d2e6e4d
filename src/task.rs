//! 任务文件：按名称描述的网、起点、目标、禁用迁移、容量与 P-不变量。
//!
//! ```ron
//! (
//!     places: [(name: "p1", tokens: 1), (name: "p2")],
//!     transitions: ["t1"],
//!     arcs: [(from: "p1", to: "t1"), (from: "t1", to: "p2", weight: 1)],
//!     target: Some({"p1": 0, "p2": 1}),
//! )
//! ```
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::invariants::PlaceInvariant;
use crate::net::io::{IoError, read_by_extension};
use crate::net::{Net, NetError, Place, PlaceId, Transition, TransitionId, Weight};
use crate::search::SearchRequest;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("unknown place `{0}`")]
    UnknownPlace(String),
    #[error("unknown transition `{0}`")]
    UnknownTransition(String),
    #[error("arc `{from}` -> `{to}` must connect a place and a transition")]
    DanglingArc { from: String, to: String },
    #[error(transparent)]
    Net(#[from] NetError),
    #[error(transparent)]
    Io(#[from] IoError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPlace {
    pub name: String,
    #[serde(default)]
    pub tokens: Weight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskArc {
    pub from: String,
    pub to: String,
    #[serde(default = "unit_weight")]
    pub weight: Weight,
}

fn unit_weight() -> Weight {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityTask {
    pub places: Vec<TaskPlace>,
    pub transitions: Vec<String>,
    pub arcs: Vec<TaskArc>,
    /// 缺省时取各库所的初始托肯。
    #[serde(default)]
    pub start: Option<IndexMap<String, Weight>>,
    /// 缺省时与起点相同，仅适用于穷举模式。
    #[serde(default)]
    pub target: Option<IndexMap<String, Weight>>,
    #[serde(default)]
    pub knockouts: Vec<String>,
    #[serde(default)]
    pub capacities: IndexMap<String, Weight>,
    #[serde(default)]
    pub invariants: Vec<IndexMap<String, i64>>,
}

/// 解析后的任务，可直接交给 [`crate::search::Controller`]。
#[derive(Debug, Clone)]
pub struct ResolvedTask {
    pub net: Net,
    pub request: SearchRequest,
    pub invariants: Vec<PlaceInvariant>,
}

impl ReachabilityTask {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TaskError> {
        Ok(read_by_extension(path)?)
    }

    pub fn build_net(&self) -> Result<Net, TaskError> {
        let mut net = Net::empty();
        for place in &self.places {
            net.add_place(Place::new_with_tokens(&place.name, place.tokens));
        }
        for transition in &self.transitions {
            net.add_transition(Transition::new(transition));
        }
        for arc in &self.arcs {
            match (
                net.place_by_name(&arc.from),
                net.transition_by_name(&arc.to),
                net.transition_by_name(&arc.from),
                net.place_by_name(&arc.to),
            ) {
                (Some(place), Some(transition), _, _) => {
                    net.add_input_arc(place, transition, arc.weight)?
                }
                (_, _, Some(transition), Some(place)) => {
                    net.add_output_arc(place, transition, arc.weight)?
                }
                _ => {
                    return Err(TaskError::DanglingArc {
                        from: arc.from.clone(),
                        to: arc.to.clone(),
                    });
                }
            }
        }
        net.validate()?;
        Ok(net)
    }

    pub fn resolve(&self) -> Result<ResolvedTask, TaskError> {
        let net = self.build_net()?;
        let start = match &self.start {
            Some(start) => by_place(&net, start)?,
            None => net
                .places
                .iter_enumerated()
                .map(|(id, place)| (id, place.tokens))
                .collect(),
        };
        let target = match &self.target {
            Some(target) => by_place(&net, target)?,
            None => start.clone(),
        };
        let knockouts = self
            .knockouts
            .iter()
            .map(|name| transition(&net, name))
            .collect::<Result<IndexSet<_>, _>>()?;
        let mut request = SearchRequest::new(start, target).with_knockouts(knockouts);
        if !self.capacities.is_empty() {
            request = request.with_capacities(by_place(&net, &self.capacities)?);
        }
        let invariants = self
            .invariants
            .iter()
            .map(|factors| by_place(&net, factors).map(PlaceInvariant::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedTask {
            net,
            request,
            invariants,
        })
    }
}

fn by_place(
    net: &Net,
    values: &IndexMap<String, i64>,
) -> Result<IndexMap<PlaceId, i64>, TaskError> {
    values
        .iter()
        .map(|(name, value)| {
            net.place_by_name(name)
                .map(|place| (place, *value))
                .ok_or_else(|| TaskError::UnknownPlace(name.clone()))
        })
        .collect()
}

fn transition(net: &Net, name: &str) -> Result<TransitionId, TaskError> {
    net.transition_by_name(name)
        .ok_or_else(|| TaskError::UnknownTransition(name.to_owned()))
}
