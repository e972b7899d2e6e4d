//! 可达图 / 覆盖图：节点为互不相同的标识，边为一次迁移发射。
use std::fs;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::{EdgeReference, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::Serialize;

use crate::net::core::escape_label;
use crate::net::{Marking, Net, Tokens, TransitionId};

pub type StateGraph = StableGraph<StateNode, StateEdge>;

#[derive(Debug, Clone)]
pub struct StateNode {
    pub index: usize,
    pub marking: Marking,
    /// 首次被记录时的深度。
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateEdge {
    pub transition: TransitionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateGraphStats {
    pub state_count: usize,
    pub edge_count: usize,
    pub deadlock_count: usize,
    pub omega_count: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedNode {
    pub index: usize,
    pub marking: Marking,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedEdge {
    pub source: usize,
    pub target: usize,
    pub transition: String,
}

/// 供 JSON 输出的扁平化视图。
#[derive(Debug, Clone, Serialize)]
pub struct ExportedGraph {
    pub places: Vec<String>,
    pub nodes: Vec<ExportedNode>,
    pub edges: Vec<ExportedEdge>,
    pub stats: StateGraphStats,
}

#[derive(Debug, Clone)]
pub struct ReachabilityGraph {
    pub graph: StateGraph,
    pub initial: NodeIndex,
    pub markings: IndexMap<Marking, NodeIndex>,
    pub deadlocks: IndexSet<NodeIndex>,
    pub truncated: bool,
}

impl ReachabilityGraph {
    pub fn new(initial: Marking) -> Self {
        let mut graph = StableGraph::new();
        let index = graph.add_node(StateNode {
            index: 0,
            marking: initial.clone(),
            depth: 0,
        });
        let mut markings = IndexMap::new();
        markings.insert(initial, index);
        Self {
            graph,
            initial: index,
            markings,
            deadlocks: IndexSet::new(),
            truncated: false,
        }
    }

    /// 记录标识；已存在时返回原节点，第二个返回值表示是否为新节点。
    pub fn insert(&mut self, marking: Marking, depth: usize) -> (NodeIndex, bool) {
        if let Some(&index) = self.markings.get(&marking) {
            return (index, false);
        }
        let index = self.graph.add_node(StateNode {
            index: self.markings.len(),
            marking: marking.clone(),
            depth,
        });
        self.markings.insert(marking, index);
        (index, true)
    }

    /// 同一 (source, target, transition) 只保留一条边。
    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex, transition: TransitionId) {
        let exists = self
            .graph
            .edges(source)
            .any(|edge| edge.target() == target && edge.weight().transition == transition);
        if !exists {
            self.graph.add_edge(source, target, StateEdge { transition });
        }
    }

    pub fn mark_deadlock(&mut self, index: NodeIndex) {
        self.deadlocks.insert(index);
    }

    pub fn node(&self, index: NodeIndex) -> &StateNode {
        &self.graph[index]
    }

    pub fn index_of(&self, marking: &Marking) -> Option<NodeIndex> {
        self.markings.get(marking).copied()
    }

    pub fn contains_marking(&self, marking: &Marking) -> bool {
        self.markings.contains_key(marking)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// 记录顺序下的全部标识。
    pub fn markings(&self) -> impl Iterator<Item = &Marking> {
        self.markings.keys()
    }

    /// 全部边 `(source, target, transition)`。
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, TransitionId)> + '_ {
        self.graph
            .edge_references()
            .map(|edge| (edge.source(), edge.target(), edge.weight().transition))
    }

    /// 按端点查找一条边。
    pub fn edge_between(&self, source: NodeIndex, target: NodeIndex) -> Option<&StateEdge> {
        self.graph
            .edges(source)
            .find(|edge| edge.target() == target)
            .map(|edge| edge.weight())
    }

    pub fn edge_between_markings(
        &self,
        source: &Marking,
        target: &Marking,
    ) -> Option<&StateEdge> {
        self.edge_between(self.index_of(source)?, self.index_of(target)?)
    }

    pub fn successors(
        &self,
        index: NodeIndex,
    ) -> impl Iterator<Item = (TransitionId, NodeIndex)> + '_ {
        self.graph
            .edges(index)
            .map(|edge| (edge.weight().transition, edge.target()))
    }

    pub fn stats(&self) -> StateGraphStats {
        StateGraphStats {
            state_count: self.node_count(),
            edge_count: self.edge_count(),
            deadlock_count: self.deadlocks.len(),
            omega_count: self.markings().filter(|m| m.has_omega()).count(),
            truncated: self.truncated,
        }
    }

    pub fn export(&self, net: &Net) -> ExportedGraph {
        ExportedGraph {
            places: net.places.iter().map(|p| p.name.clone()).collect(),
            nodes: self
                .markings
                .values()
                .map(|&index| ExportedNode {
                    index: self.graph[index].index,
                    marking: self.graph[index].marking.clone(),
                })
                .collect(),
            edges: self
                .edges()
                .map(|(source, target, transition)| ExportedEdge {
                    source: self.graph[source].index,
                    target: self.graph[target].index,
                    transition: net.transition_name(transition).to_owned(),
                })
                .collect(),
            stats: self.stats(),
        }
    }

    pub fn dot(&self, net: &Net) -> String {
        let edge_attr = |_: &StateGraph, edge: EdgeReference<'_, StateEdge>| {
            let name = net.transition_name(edge.weight().transition);
            format!("label=\"{}\"", escape_label(name))
        };
        let node_attr = |_: &StateGraph, (idx, node): (NodeIndex, &StateNode)| {
            let tokens = node
                .marking
                .iter()
                .filter(|(_, tokens)| *tokens != Tokens::ZERO)
                .map(|(place, tokens)| {
                    let name = net.get_place(place).map_or("?", |p| p.name.as_str());
                    format!("{}:{}", escape_label(name), tokens)
                })
                .join(", ");
            let shape = if idx == self.initial { ", peripheries=2" } else { "" };
            format!("label=\"s{}\\n{}\"{}", node.index, tokens, shape)
        };

        format!(
            "{:?}",
            Dot::with_attr_getters(
                &self.graph,
                &[Config::EdgeNoLabel, Config::NodeNoLabel],
                &edge_attr,
                &node_attr
            )
        )
    }

    pub fn write_dot<P: AsRef<Path>>(&self, net: &Net, path: P) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.dot(net))
    }
}
