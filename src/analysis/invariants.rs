//! P-不变量与可行性预检。
//!
//! 对 P-不变量 `y`（满足 `yᵀ·C = 0`）任意可达标识的加权和 `Σ y[p]·M[p]` 恒定，
//! 因此起点与目标的加权和不同即可判定目标不可达。该检查可靠但不完备。
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::net::{Idx, Marking, Net, PlaceId, Tokens};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceInvariant {
    factors: IndexMap<PlaceId, i64>,
}

impl PlaceInvariant {
    /// 系数为 0 的项不保存。
    pub fn new<I>(factors: I) -> Self
    where
        I: IntoIterator<Item = (PlaceId, i64)>,
    {
        Self {
            factors: factors.into_iter().filter(|(_, f)| *f != 0).collect(),
        }
    }

    pub fn from_dense(factors: &[i64]) -> Self {
        Self::new(
            factors
                .iter()
                .enumerate()
                .map(|(idx, f)| (PlaceId::from_usize(idx), *f)),
        )
    }

    pub fn factor(&self, place: PlaceId) -> i64 {
        self.factors.get(&place).copied().unwrap_or(0)
    }

    pub fn support(&self) -> impl Iterator<Item = (PlaceId, i64)> + '_ {
        self.factors.iter().map(|(p, f)| (*p, *f))
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// 涉及 ω 分量或引用不存在的库所时无法给出结论，返回 `None`。
    pub fn weighted_sum(&self, marking: &Marking) -> Option<i128> {
        self.support().try_fold(0i128, |acc, (place, factor)| {
            if place.index() >= marking.len() {
                return None;
            }
            match marking.tokens(place) {
                Tokens::Finite(n) => Some(acc + i128::from(factor) * i128::from(n)),
                Tokens::Omega => None,
            }
        })
    }

    /// 校验 `yᵀ·C = 0`。
    pub fn holds_for(&self, net: &Net) -> bool {
        let effect = net.c_matrix();
        net.transitions.indices().all(|t| {
            effect
                .column(t)
                .map(|(place, delta)| i128::from(self.factor(place)) * i128::from(delta))
                .sum::<i128>()
                == 0
        })
    }
}

/// 若存在不变量在起点与目标上给出不同的有限加权和则返回 `false`（目标必不可达）。
pub fn check_place_invariants(
    invariants: &[PlaceInvariant],
    start: &Marking,
    target: &Marking,
) -> bool {
    for (idx, invariant) in invariants.iter().enumerate() {
        let (Some(before), Some(after)) =
            (invariant.weighted_sum(start), invariant.weighted_sum(target))
        else {
            debug!("place invariant #{idx} is inconclusive, skipped");
            continue;
        };
        if before != after {
            debug!("place invariant #{idx} separates start ({before}) from target ({after})");
            return false;
        }
    }
    true
}

#[cfg(feature = "invariants")]
pub use basis::compute_place_invariants;

#[cfg(feature = "invariants")]
mod basis {
    use num::bigint::BigInt;
    use num::integer::Integer;
    use num::rational::BigRational;
    use num::traits::{One, Signed, ToPrimitive, Zero};

    use super::PlaceInvariant;
    use crate::net::{Idx, Net};

    /// 以 `Cᵀ` 的有理零空间求 P-不变量基；系数超出 `i64` 的向量被丢弃。
    pub fn compute_place_invariants(net: &Net) -> Vec<PlaceInvariant> {
        let effect = net.c_matrix();
        let places = net.places_len();
        // 行 = 迁移，列 = 库所
        let rows = net
            .transitions
            .indices()
            .map(|t| {
                let mut row = vec![BigRational::zero(); places];
                for (place, delta) in effect.column(t) {
                    row[place.index()] = BigRational::from_integer(BigInt::from(delta));
                }
                row
            })
            .collect::<Vec<_>>();

        nullspace(rows, places)
            .into_iter()
            .filter_map(|vector| {
                let dense = vector
                    .iter()
                    .map(|value| value.to_i64())
                    .collect::<Option<Vec<_>>>()?;
                Some(PlaceInvariant::from_dense(&dense))
            })
            .collect()
    }

    fn nullspace(mut rows: Vec<Vec<BigRational>>, cols: usize) -> Vec<Vec<BigInt>> {
        let mut pivots = Vec::new();
        let mut rank = 0;
        for col in 0..cols {
            let Some(found) = (rank..rows.len()).find(|&r| !rows[r][col].is_zero()) else {
                continue;
            };
            rows.swap(rank, found);
            let lead = rows[rank][col].clone();
            rows[rank].iter_mut().for_each(|value| *value /= lead.clone());
            let pivot_row = rows[rank].clone();
            for (r, row) in rows.iter_mut().enumerate() {
                if r == rank || row[col].is_zero() {
                    continue;
                }
                let factor = row[col].clone();
                for (value, pivot) in row.iter_mut().zip(pivot_row.iter()).skip(col) {
                    *value -= pivot * &factor;
                }
            }
            pivots.push(col);
            rank += 1;
            if rank == rows.len() {
                break;
            }
        }

        (0..cols)
            .filter(|col| !pivots.contains(col))
            .map(|free| {
                let mut vector = vec![BigRational::zero(); cols];
                vector[free] = BigRational::one();
                for (row, &pivot) in pivots.iter().enumerate() {
                    vector[pivot] = -rows[row][free].clone();
                }
                to_primitive_integers(vector)
            })
            .collect()
    }

    /// 通分后再除以全部分量的最大公约数。
    fn to_primitive_integers(vector: Vec<BigRational>) -> Vec<BigInt> {
        let lcm = vector
            .iter()
            .fold(BigInt::one(), |acc, value| acc.lcm(value.denom()));
        let scaled = vector
            .into_iter()
            .map(|value| value.numer() * (&lcm / value.denom()))
            .collect::<Vec<_>>();
        let gcd = scaled
            .iter()
            .filter(|value| !value.is_zero())
            .fold(BigInt::zero(), |acc, value| acc.gcd(&value.abs()));
        if gcd.is_zero() || gcd.is_one() {
            return scaled;
        }
        scaled.into_iter().map(|value| value / &gcd).collect()
    }
}
