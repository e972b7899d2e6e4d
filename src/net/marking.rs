//! 标识与 ω 托肯算术。
//!
//! `Tokens` 取值于 `ℕ ∪ {ω}`：`ω ± k = ω`，有限值溢出时同样视为 `ω`。
//! 标识上的偏序为逐分量比较，`ω` 大于任何有限值且等于自身。
use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::net::ids::PlaceId;
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::{Place, Weight};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkingError {
    #[error("marking has no entry for place {name} ({place})")]
    MissingPlace { place: PlaceId, name: String },
    #[error("marking refers to unknown place {0}")]
    UnknownPlace(PlaceId),
    #[error("negative token count {tokens} for place {place}")]
    NegativeTokens { place: PlaceId, tokens: Weight },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tokens {
    Finite(Weight),
    Omega,
}

impl Tokens {
    pub const ZERO: Tokens = Tokens::Finite(0);

    pub fn is_omega(self) -> bool {
        matches!(self, Tokens::Omega)
    }

    pub fn finite(self) -> Option<Weight> {
        match self {
            Tokens::Finite(n) => Some(n),
            Tokens::Omega => None,
        }
    }

    /// `delta` 可正可负；溢出即 ω。
    pub fn add(self, delta: Weight) -> Tokens {
        match self {
            Tokens::Finite(n) => n.checked_add(delta).map_or(Tokens::Omega, Tokens::Finite),
            Tokens::Omega => Tokens::Omega,
        }
    }

    pub fn covers(self, weight: Weight) -> bool {
        match self {
            Tokens::Finite(n) => n >= weight,
            Tokens::Omega => true,
        }
    }
}

impl Default for Tokens {
    fn default() -> Self {
        Tokens::ZERO
    }
}

impl From<Weight> for Tokens {
    fn from(value: Weight) -> Self {
        Tokens::Finite(value)
    }
}

impl fmt::Display for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tokens::Finite(n) => write!(f, "{n}"),
            Tokens::Omega => f.write_str("ω"),
        }
    }
}

impl Serialize for Tokens {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Tokens::Finite(n) => serializer.serialize_i64(*n),
            Tokens::Omega => serializer.serialize_str("omega"),
        }
    }
}

impl<'de> Deserialize<'de> for Tokens {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TokensVisitor;

        impl Visitor<'_> for TokensVisitor {
            type Value = Tokens;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a token count or \"omega\"")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Tokens, E> {
                Ok(Tokens::Finite(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Tokens, E> {
                Weight::try_from(v)
                    .map(Tokens::Finite)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Tokens, E> {
                match v {
                    "omega" | "ω" => Ok(Tokens::Omega),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(TokensVisitor)
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Marking(pub IndexVec<PlaceId, Tokens>);

impl Marking {
    pub fn new(tokens: IndexVec<PlaceId, Tokens>) -> Self {
        Self(tokens)
    }

    pub fn from_weights<I>(weights: I) -> Self
    where
        I: IntoIterator<Item = Weight>,
    {
        Self(weights.into_iter().map(Tokens::Finite).collect())
    }

    /// 按库所 ID 给出的完整赋值构造标识；每个库所都必须出现。
    pub fn from_assignment(
        places: &IndexVec<PlaceId, Place>,
        assignment: &IndexMap<PlaceId, Weight>,
    ) -> Result<Self, MarkingError> {
        if let Some(unknown) = assignment.keys().find(|p| !places.contains_index(**p)) {
            return Err(MarkingError::UnknownPlace(*unknown));
        }
        let mut tokens = IndexVec::with_capacity(places.len());
        for (place, info) in places.iter_enumerated() {
            let Some(&count) = assignment.get(&place) else {
                return Err(MarkingError::MissingPlace {
                    place,
                    name: info.name.clone(),
                });
            };
            if count < 0 {
                return Err(MarkingError::NegativeTokens {
                    place,
                    tokens: count,
                });
            }
            tokens.push(Tokens::Finite(count));
        }
        Ok(Self(tokens))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, Tokens)> + '_ {
        self.0.iter_enumerated().map(|(place, tokens)| (place, *tokens))
    }

    pub fn tokens(&self, place: PlaceId) -> Tokens {
        self.0[place]
    }

    pub fn set(&mut self, place: PlaceId, tokens: Tokens) {
        self.0[place] = tokens;
    }

    pub fn has_omega(&self) -> bool {
        self.0.iter().any(|tokens| tokens.is_omega())
    }

    pub fn omega_places(&self) -> Vec<PlaceId> {
        self.iter()
            .filter(|(_, tokens)| tokens.is_omega())
            .map(|(place, _)| place)
            .collect()
    }

    /// 逐分量 `self ≥ other`。
    pub fn covers(&self, other: &Marking) -> bool {
        matches!(
            self.partial_cmp(other),
            Some(Ordering::Greater | Ordering::Equal)
        )
    }

    /// 严格支配：逐分量 `≥` 且至少一处 `>`。
    pub fn dominates(&self, other: &Marking) -> bool {
        self.partial_cmp(other) == Some(Ordering::Greater)
    }

    /// 若 `self` 严格支配 `ancestor`，把增长的分量提升为 ω，返回是否有分量被改写。
    pub fn widen_against(&mut self, ancestor: &Marking) -> bool {
        if !self.dominates(ancestor) {
            return false;
        }
        let mut widened = false;
        for (place, tokens) in self.0.iter_enumerated_mut() {
            if !tokens.is_omega() && *tokens > ancestor.tokens(place) {
                *tokens = Tokens::Omega;
                widened = true;
            }
        }
        widened
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (place, tokens) in self.iter() {
            map.entry(&place, &tokens);
        }
        map.finish()
    }
}

impl fmt::Display for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (place, tokens) in self.iter() {
            if place.index() > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{tokens}")?;
        }
        f.write_str(")")
    }
}

impl PartialOrd for Marking {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.len() != other.len() {
            return None;
        }
        let mut less = false;
        let mut greater = false;
        for (left, right) in self.0.iter().zip(other.0.iter()) {
            match left.cmp(right) {
                Ordering::Less => less = true,
                Ordering::Greater => greater = true,
                Ordering::Equal => {}
            }
        }
        match (less, greater) {
            (true, true) => None,
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => Some(Ordering::Equal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marking(values: &[Tokens]) -> Marking {
        Marking(values.iter().copied().collect())
    }

    #[test]
    fn omega_arithmetic_is_absorbing() {
        assert_eq!(Tokens::Omega.add(-5), Tokens::Omega);
        assert_eq!(Tokens::Omega.add(7), Tokens::Omega);
        assert_eq!(Tokens::Finite(3).add(-2), Tokens::Finite(1));
        assert!(Tokens::Omega.covers(Weight::MAX));
    }

    #[test]
    fn overflow_becomes_omega() {
        assert_eq!(Tokens::Finite(Weight::MAX).add(1), Tokens::Omega);
    }

    #[test]
    fn omega_orders_above_finite() {
        assert!(Tokens::Omega > Tokens::Finite(Weight::MAX));
        assert_eq!(Tokens::Omega.cmp(&Tokens::Omega), Ordering::Equal);
    }

    #[test]
    fn domination_is_strict() {
        let a = Marking::from_weights([1, 2]);
        let b = Marking::from_weights([1, 1]);
        assert!(a.dominates(&b));
        assert!(!a.dominates(&a));
        assert!(a.covers(&a));
        let c = Marking::from_weights([0, 3]);
        assert_eq!(a.partial_cmp(&c), None);
    }

    #[test]
    fn widening_only_touches_grown_places() {
        let ancestor = Marking::from_weights([1, 0]);
        let mut next = Marking::from_weights([1, 2]);
        assert!(next.widen_against(&ancestor));
        assert_eq!(next, marking(&[Tokens::Finite(1), Tokens::Omega]));
        // 已是 ω 的分量保持不变，再次加宽无效果。
        assert!(!next.clone().widen_against(&next));
    }

    #[test]
    fn widening_ignores_incomparable_ancestor() {
        let ancestor = Marking::from_weights([2, 0]);
        let mut next = Marking::from_weights([1, 5]);
        assert!(!next.widen_against(&ancestor));
        assert_eq!(next, Marking::from_weights([1, 5]));
    }

    #[test]
    fn assignment_must_be_total() {
        let places: IndexVec<PlaceId, Place> =
            IndexVec::from(vec![Place::new("p1"), Place::new("p2")]);
        let mut assignment = IndexMap::new();
        assignment.insert(PlaceId::new(0), 1);
        assert!(matches!(
            Marking::from_assignment(&places, &assignment),
            Err(MarkingError::MissingPlace { name, .. }) if name == "p2"
        ));

        assignment.insert(PlaceId::new(1), -1);
        assert!(matches!(
            Marking::from_assignment(&places, &assignment),
            Err(MarkingError::NegativeTokens { .. })
        ));

        assignment.insert(PlaceId::new(1), 0);
        assignment.insert(PlaceId::new(9), 0);
        assert_eq!(
            Marking::from_assignment(&places, &assignment),
            Err(MarkingError::UnknownPlace(PlaceId::new(9)))
        );
    }

    #[test]
    fn display_and_json() {
        let m = marking(&[Tokens::Finite(2), Tokens::Omega]);
        assert_eq!(m.to_string(), "(2, ω)");
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "[2,\"omega\"]");
        let back: Marking = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
