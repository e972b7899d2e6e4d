//! 前置/后置关联矩阵与效应矩阵 `C = Post - Pre` 的行存储封装.
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::Weight;

pub(crate) type SmallRow<T> = SmallVec<[T; 4]>;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Incidence<T> {
    rows: IndexVec<PlaceId, SmallRow<T>>,
    cols: usize,
}

impl<T> Incidence<T>
where
    T: Clone,
{
    pub fn new(places: usize, transitions: usize, default: T) -> Self {
        let mut rows = IndexVec::new();
        for _ in 0..places {
            rows.push(SmallRow::from_elem(default.clone(), transitions));
        }
        Self {
            rows,
            cols: transitions,
        }
    }

    pub fn push_place_with_default(&mut self, default: T) -> PlaceId {
        let mut row = SmallRow::new();
        row.resize(self.cols, default);
        self.rows.push(row)
    }

    pub fn push_transition_with_default(&mut self, default: T) -> TransitionId {
        let next = self.cols;
        for row in self.rows.iter_mut() {
            row.push(default.clone());
        }
        self.cols += 1;
        TransitionId::from_usize(next)
    }

    pub fn places(&self) -> usize {
        self.rows.len()
    }

    pub fn transitions(&self) -> usize {
        self.cols
    }

    /// 行数与列数是否与给定的库所/迁移数量一致（反序列化后的完整性检查）。
    pub fn has_shape(&self, places: usize, transitions: usize) -> bool {
        self.rows.len() == places && self.rows.iter().all(|row| row.len() == transitions)
    }

    pub fn get(&self, place: PlaceId, transition: TransitionId) -> &T {
        &self.rows[place][transition.index()]
    }

    pub fn get_mut(&mut self, place: PlaceId, transition: TransitionId) -> &mut T {
        &mut self.rows[place][transition.index()]
    }

    pub fn rows(&self) -> &IndexVec<PlaceId, SmallRow<T>> {
        &self.rows
    }

    pub fn map<U, F>(&self, mut f: F) -> Incidence<U>
    where
        U: Clone,
        F: FnMut(&T) -> U,
    {
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(&mut f).collect::<SmallRow<_>>())
            .collect();
        Incidence {
            rows,
            cols: self.cols,
        }
    }
}

impl<T> fmt::Debug for Incidence<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Incidence")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

impl Incidence<Weight> {
    /// 逐元素相减，`self - other`。两矩阵形状必须一致。
    pub fn difference(&self, other: &Self) -> Incidence<Weight> {
        debug_assert_eq!(self.places(), other.places());
        debug_assert_eq!(self.transitions(), other.transitions());
        let rows = self
            .rows
            .iter()
            .zip(other.rows.iter())
            .map(|(left, right)| {
                left.iter()
                    .zip(right.iter())
                    .map(|(l, r)| l.saturating_sub(*r))
                    .collect::<SmallRow<_>>()
            })
            .collect();
        Incidence {
            rows,
            cols: self.cols,
        }
    }

    /// 累加弧权重；同一 (place, transition) 上的重复弧合并为一条。
    pub fn accumulate(&mut self, place: PlaceId, transition: TransitionId, delta: Weight) {
        let entry = self.get_mut(place, transition);
        *entry = entry.saturating_add(delta);
    }

    /// 迁移 `transition` 所在列的非零项。
    pub fn column(
        &self,
        transition: TransitionId,
    ) -> impl Iterator<Item = (PlaceId, Weight)> + '_ {
        self.rows
            .iter_enumerated()
            .filter_map(move |(place, row)| match row[transition.index()] {
                0 => None,
                weight => Some((place, weight)),
            })
    }

    /// 与库所 `place` 有弧相连的迁移个数。
    pub fn degree(&self, place: PlaceId) -> usize {
        self.rows[place].iter().filter(|weight| **weight != 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_merges_parallel_arcs() {
        let mut pre = Incidence::new(1, 1, 0);
        let p = PlaceId::new(0);
        let t = TransitionId::new(0);
        pre.accumulate(p, t, 1);
        pre.accumulate(p, t, 1);
        assert_eq!(*pre.get(p, t), 2);
    }

    #[test]
    fn difference_and_column() {
        let mut pre = Incidence::new(2, 1, 0);
        let mut post = Incidence::new(2, 1, 0);
        let t = TransitionId::new(0);
        pre.accumulate(PlaceId::new(0), t, 1);
        post.accumulate(PlaceId::new(1), t, 3);

        let effect = post.difference(&pre);
        assert_eq!(
            effect.column(t).collect::<Vec<_>>(),
            vec![(PlaceId::new(0), -1), (PlaceId::new(1), 3)]
        );
        assert_eq!(effect.degree(PlaceId::new(0)), 1);
    }

    #[test]
    fn growing_keeps_shape() {
        let mut pre = Incidence::new(0, 0, 0);
        pre.push_place_with_default(0);
        pre.push_transition_with_default(0);
        pre.push_place_with_default(0);
        assert!(pre.has_shape(2, 1));
        assert!(!pre.has_shape(2, 2));
    }
}
