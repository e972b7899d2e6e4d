//! 搜索树：以下标寻址的只增节点池，每个节点记录前驱下标与到达它的迁移。
use crate::net::ids::define_id;
use crate::net::index_vec::IndexVec;
use crate::net::{Marking, TransitionId};

define_id!(NodeId, "n");

#[derive(Debug, Clone)]
pub struct SearchNode {
    pub marking: Marking,
    pub predecessor: Option<NodeId>,
    /// 从前驱到本节点所发射的迁移，根节点为 `None`。
    pub via: Option<TransitionId>,
    pub depth: usize,
    pub priority: f64,
}

#[derive(Debug, Clone)]
pub struct SearchTree {
    nodes: IndexVec<NodeId, SearchNode>,
}

impl SearchTree {
    pub fn new(root: Marking) -> Self {
        let mut nodes = IndexVec::new();
        nodes.push(SearchNode {
            marking: root,
            predecessor: None,
            via: None,
            depth: 0,
            priority: 0.0,
        });
        Self { nodes }
    }

    pub fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push_child(&mut self, parent: NodeId, via: TransitionId, marking: Marking) -> NodeId {
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(SearchNode {
            marking,
            predecessor: Some(parent),
            via: Some(via),
            depth,
            priority: 0.0,
        })
    }

    pub fn node(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id]
    }

    pub fn marking(&self, id: NodeId) -> &Marking {
        &self.nodes[id].marking
    }

    pub fn set_priority(&mut self, id: NodeId, priority: f64) {
        self.nodes[id].priority = priority;
    }

    /// 从 `id` 沿前驱回到根（含 `id` 自身与根）。
    pub fn path_to_root(&self, id: NodeId) -> impl Iterator<Item = NodeId> + Clone + '_ {
        std::iter::successors(Some(id), move |current| self.nodes[*current].predecessor)
    }

    /// 严格祖先的标识，由近及远。
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = &Marking> + Clone + '_ {
        self.path_to_root(id)
            .skip(1)
            .map(move |node| &self.nodes[node].marking)
    }

    /// 根到 `id` 的迁移序列。
    pub fn backtrack(&self, id: NodeId) -> Vec<TransitionId> {
        let mut path = self
            .path_to_root(id)
            .filter_map(|node| self.nodes[node].via)
            .collect::<Vec<_>>();
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backtrack_walks_predecessors_in_firing_order() {
        let mut tree = SearchTree::new(Marking::from_weights([1, 0, 0]));
        let root = tree.root();
        let a = tree.push_child(root, TransitionId::new(0), Marking::from_weights([0, 1, 0]));
        let b = tree.push_child(a, TransitionId::new(1), Marking::from_weights([0, 0, 1]));
        let _side = tree.push_child(root, TransitionId::new(2), Marking::from_weights([2, 0, 0]));

        assert_eq!(tree.node(b).depth, 2);
        assert_eq!(tree.backtrack(b), vec![TransitionId::new(0), TransitionId::new(1)]);
        assert!(tree.backtrack(tree.root()).is_empty());
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn ancestors_exclude_the_node_itself() {
        let mut tree = SearchTree::new(Marking::from_weights([0]));
        let a = tree.push_child(tree.root(), TransitionId::new(0), Marking::from_weights([1]));
        let b = tree.push_child(a, TransitionId::new(0), Marking::from_weights([2]));
        let seen = tree.ancestors(b).cloned().collect::<Vec<_>>();
        assert_eq!(seen, vec![Marking::from_weights([1]), Marking::from_weights([0])]);
        assert_eq!(tree.path_to_root(b).count(), 3);
    }
}
