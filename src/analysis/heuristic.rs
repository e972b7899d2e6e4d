//! Best-First 与 A* 使用的剩余距离估计。
//!
//! 名称按策略解析：Best-First 的 `"Default"` 为逐库所托肯差之和，
//! `"Weighted Default"` 再按库所的连接迁移数缩放；A* 的 `"Default"` 为发射次数下界。
use std::fmt;

use crate::analysis::firing::FiringRule;
use crate::net::{IndexVec, Marking, PlaceId, Tokens, Weight};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Heuristic {
    /// `Σ_p |target[p] - m[p]|`
    TokenDistance,
    /// `Σ_p |target[p] - m[p]| / deg(p)`
    WeightedTokenDistance,
    /// `max_p ⌈差值 / 单次发射的最大变化量⌉`，可采纳且一致。
    FiringBound,
}

impl Heuristic {
    pub fn default_for(astar: bool) -> Self {
        if astar {
            Heuristic::FiringBound
        } else {
            Heuristic::TokenDistance
        }
    }

    /// 名称大小写、空白、`-`/`_` 不敏感。
    pub fn from_name(name: &str, astar: bool) -> Option<Self> {
        match normalize(name).as_str() {
            "default" => Some(Self::default_for(astar)),
            "weighteddefault" if !astar => Some(Heuristic::WeightedTokenDistance),
            "tokendistance" => Some(Heuristic::TokenDistance),
            "weightedtokendistance" => Some(Heuristic::WeightedTokenDistance),
            "firingbound" => Some(Heuristic::FiringBound),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Heuristic::TokenDistance => "Token Distance",
            Heuristic::WeightedTokenDistance => "Weighted Token Distance",
            Heuristic::FiringBound => "Firing Bound",
        }
    }
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// 针对固定目标预先计算好的估值器。
#[derive(Debug, Clone)]
pub struct Estimator {
    heuristic: Heuristic,
    target: Marking,
    place_weight: IndexVec<PlaceId, f64>,
    max_gain: IndexVec<PlaceId, Weight>,
    max_loss: IndexVec<PlaceId, Weight>,
}

impl Estimator {
    pub fn new(heuristic: Heuristic, rule: &FiringRule, target: &Marking) -> Self {
        let places = rule.places_len();
        let place_weight = (0..places)
            .map(|idx| {
                let place = PlaceId::new(idx as u32);
                match heuristic {
                    Heuristic::WeightedTokenDistance => 1.0 / rule.degree(place).max(1) as f64,
                    _ => 1.0,
                }
            })
            .collect();

        let mut max_gain = IndexVec::from_elem(0, places);
        let mut max_loss = IndexVec::from_elem(0, places);
        for transition in rule.active_transitions() {
            for &(place, delta) in rule.effect(transition) {
                if delta > 0 {
                    max_gain[place] = max_gain[place].max(delta);
                } else {
                    max_loss[place] = max_loss[place].max(delta.saturating_neg());
                }
            }
        }

        Self {
            heuristic,
            target: target.clone(),
            place_weight,
            max_gain,
            max_loss,
        }
    }

    pub fn heuristic(&self) -> Heuristic {
        self.heuristic
    }

    pub fn estimate(&self, marking: &Marking) -> f64 {
        let gaps = marking
            .iter()
            .filter_map(|(place, tokens)| match (tokens, self.target.tokens(place)) {
                (Tokens::Finite(have), Tokens::Finite(want)) => {
                    Some((place, want.saturating_sub(have)))
                }
                _ => None,
            });

        match self.heuristic {
            Heuristic::TokenDistance | Heuristic::WeightedTokenDistance => gaps
                .map(|(place, gap)| gap.unsigned_abs() as f64 * self.place_weight[place])
                .sum(),
            Heuristic::FiringBound => gaps
                .map(|(place, gap)| {
                    let step = if gap > 0 {
                        self.max_gain[place]
                    } else {
                        self.max_loss[place]
                    };
                    match (gap, step) {
                        (0, _) => 0.0,
                        (_, 0) => f64::INFINITY,
                        _ => gap.unsigned_abs().div_ceil(step.unsigned_abs()) as f64,
                    }
                })
                .fold(0.0, f64::max),
        }
    }
}
