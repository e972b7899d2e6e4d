//! 激发规则：在网结构之上叠加禁用迁移（knockout）与库所容量约束。
//!
//! 容量约束违反不是错误，仅使该迁移在当前标识下视为不可激发。
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::net::incidence::SmallRow;
use crate::net::{Idx, IndexVec, Marking, Net, NetError, PlaceId, TransitionId, Weight};

#[derive(Debug, Clone)]
pub struct FiringRule {
    inputs: IndexVec<TransitionId, SmallRow<(PlaceId, Weight)>>,
    effects: IndexVec<TransitionId, SmallRow<(PlaceId, Weight)>>,
    degree: IndexVec<PlaceId, usize>,
    excluded: IndexVec<TransitionId, bool>,
    capacity: IndexVec<PlaceId, Option<Weight>>,
}

impl FiringRule {
    pub fn new(net: &Net) -> Result<Self, NetError> {
        net.validate()?;
        let effect = net.c_matrix();
        let inputs = net
            .transitions
            .indices()
            .map(|t| net.pre.column(t).collect::<SmallRow<_>>())
            .collect();
        let effects = net
            .transitions
            .indices()
            .map(|t| effect.column(t).collect::<SmallRow<_>>())
            .collect();
        let degree = net
            .places
            .indices()
            .map(|p| {
                net.transitions
                    .indices()
                    .filter(|t| *net.pre.get(p, *t) != 0 || *net.post.get(p, *t) != 0)
                    .count()
            })
            .collect();
        Ok(Self {
            inputs,
            effects,
            degree,
            excluded: IndexVec::from_elem(false, net.transitions_len()),
            capacity: IndexVec::from_elem(None, net.places_len()),
        })
    }

    pub fn with_excluded<I>(mut self, knockouts: I) -> Result<Self, NetError>
    where
        I: IntoIterator<Item = TransitionId>,
    {
        for transition in knockouts {
            let slot = self
                .excluded
                .get_mut(transition)
                .ok_or(NetError::UnknownTransition(transition))?;
            *slot = true;
        }
        Ok(self)
    }

    /// 容量 `<= 0` 表示不设上限。
    pub fn with_capacities(
        mut self,
        capacities: &IndexMap<PlaceId, Weight>,
    ) -> Result<Self, NetError> {
        for (&place, &bound) in capacities {
            let slot = self
                .capacity
                .get_mut(place)
                .ok_or(NetError::UnknownPlace(place))?;
            *slot = (bound > 0).then_some(bound);
        }
        Ok(self)
    }

    pub fn transitions_len(&self) -> usize {
        self.effects.len()
    }

    pub fn places_len(&self) -> usize {
        self.degree.len()
    }

    pub fn is_excluded(&self, transition: TransitionId) -> bool {
        self.excluded.get(transition).copied().unwrap_or(true)
    }

    pub fn capacity(&self, place: PlaceId) -> Option<Weight> {
        self.capacity.get(place).copied().flatten()
    }

    /// 与库所相连的迁移数。
    pub fn degree(&self, place: PlaceId) -> usize {
        self.degree[place]
    }

    /// 迁移的净效应 `C[:, t]` 非零项。
    pub fn effect(&self, transition: TransitionId) -> &[(PlaceId, Weight)] {
        &self.effects[transition]
    }

    pub fn active_transitions(&self) -> impl Iterator<Item = TransitionId> + '_ {
        self.excluded
            .iter_enumerated()
            .filter(|(_, excluded)| !**excluded)
            .map(|(t, _)| t)
    }

    pub fn is_enabled(&self, marking: &Marking, transition: TransitionId) -> bool {
        if self.is_excluded(transition) {
            return false;
        }
        let covered = self.inputs[transition]
            .iter()
            .all(|&(place, weight)| marking.tokens(place).covers(weight));
        covered && self.respects_capacity(marking, transition)
    }

    fn respects_capacity(&self, marking: &Marking, transition: TransitionId) -> bool {
        self.effects[transition]
            .iter()
            .filter(|(_, delta)| *delta > 0)
            .all(|&(place, delta)| {
                let after = marking.tokens(place).add(delta);
                match (self.capacity[place], after.finite()) {
                    (Some(bound), Some(after)) => after <= bound,
                    _ => true,
                }
            })
    }

    pub fn enabled_transitions(&self, marking: &Marking) -> SmallVec<[TransitionId; 8]> {
        (0..self.transitions_len())
            .map(TransitionId::from_usize)
            .filter(|t| self.is_enabled(marking, *t))
            .collect()
    }

    /// 发射已使能的迁移；调用方负责先行检查 [`Self::is_enabled`]。
    pub fn fire(&self, marking: &Marking, transition: TransitionId) -> Marking {
        let mut next = marking.clone();
        for &(place, delta) in self.effects[transition].iter() {
            next.set(place, next.tokens(place).add(delta));
        }
        next
    }

    /// 发射后对路径上所有被严格支配的祖先做 ω 加宽，直到不再变化。
    pub fn fire_omega<'a, I>(
        &self,
        marking: &Marking,
        transition: TransitionId,
        ancestors: I,
    ) -> Marking
    where
        I: Iterator<Item = &'a Marking> + Clone,
    {
        let mut next = self.fire(marking, transition);
        loop {
            let mut widened = false;
            for ancestor in ancestors.clone() {
                widened |= next.widen_against(ancestor);
            }
            if !widened {
                return next;
            }
        }
    }
}
