//! P/T 网静态结构元素：库所、迁移与弧。
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::net::ids::{PlaceId, TransitionId};

/// 弧权重与有限托肯数共用的整数域。
pub type Weight = i64;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct Place {
    pub name: String,
    #[serde(default)]
    pub tokens: Weight,
}

impl Place {
    pub fn new(name: impl Into<String>) -> Self {
        Self::new_with_tokens(name, 0)
    }

    pub fn new_with_tokens(name: impl Into<String>, tokens: Weight) -> Self {
        Self {
            name: name.into(),
            tokens,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Transition {
    pub name: String,
}

impl Transition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transition").field(&self.name).finish()
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Arc {
    pub place: PlaceId,
    pub transition: TransitionId,
    pub weight: Weight,
    pub direction: ArcDirection,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArcDirection {
    PlaceToTransition,
    TransitionToPlace,
}

impl Arc {
    pub fn new(
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
        direction: ArcDirection,
    ) -> Self {
        Self {
            place,
            transition,
            weight,
            direction,
        }
    }

    pub fn input(place: PlaceId, transition: TransitionId, weight: Weight) -> Self {
        Self::new(place, transition, weight, ArcDirection::PlaceToTransition)
    }

    pub fn output(place: PlaceId, transition: TransitionId, weight: Weight) -> Self {
        Self::new(place, transition, weight, ArcDirection::TransitionToPlace)
    }
}

impl fmt::Debug for Arc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            ArcDirection::PlaceToTransition => {
                write!(f, "{} -[{}]-> {}", self.place, self.weight, self.transition)
            }
            ArcDirection::TransitionToPlace => {
                write!(f, "{} -[{}]-> {}", self.transition, self.weight, self.place)
            }
        }
    }
}
