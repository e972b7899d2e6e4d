//! Best-First 与 A*：最小堆前沿，优先级相同时按入堆顺序。
//!
//! 对已发现但尚未展开的标识找到更短路径时，压入一个带新前驱的节点，
//! 旧的堆项在出堆时因深度不是最优而被跳过（惰性 decrease-key）。
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use petgraph::graph::NodeIndex;

use crate::analysis::heuristic::{Estimator, Heuristic};
use crate::analysis::reachability::ReachabilityGraph;
use crate::analysis::search_tree::{NodeId, SearchTree};
use crate::search::{Monitor, SearchOutcome, SearchProblem};

#[derive(Debug)]
struct Entry {
    priority: f64,
    order: u64,
    node: NodeId,
    state: NodeIndex,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // BinaryHeap 是最大堆，这里反向比较得到最小优先级、最早入堆者先出。
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.order.cmp(&self.order))
    }
}

struct Frontier {
    heap: BinaryHeap<Entry>,
    pushed: u64,
    astar: bool,
}

impl Frontier {
    fn push(
        &mut self,
        tree: &mut SearchTree,
        estimator: &Estimator,
        node: NodeId,
        state: NodeIndex,
    ) {
        let h = estimator.estimate(tree.marking(node));
        let priority = if self.astar {
            tree.node(node).depth as f64 + h
        } else {
            h
        };
        tree.set_priority(node, priority);
        self.heap.push(Entry {
            priority,
            order: self.pushed,
            node,
            state,
        });
        self.pushed += 1;
    }
}

pub(crate) fn run(
    problem: &SearchProblem,
    monitor: &mut Monitor<'_>,
    heuristic: Heuristic,
    astar: bool,
) -> SearchOutcome {
    let rule = &problem.rule;
    let estimator = Estimator::new(heuristic, rule, &problem.target);
    let mut tree = SearchTree::new(problem.start.clone());
    let mut graph = ReachabilityGraph::new(problem.start.clone());
    let mut closed = HashSet::new();
    let mut frontier = Frontier {
        heap: BinaryHeap::new(),
        pushed: 0,
        astar,
    };
    let root = tree.root();
    frontier.push(&mut tree, &estimator, root, graph.initial);

    while let Some(Entry { node, state, .. }) = frontier.heap.pop() {
        if monitor.is_interrupted() {
            return SearchOutcome::aborted(monitor.steps(), graph);
        }
        let depth = tree.node(node).depth;
        if closed.contains(&state) || depth > graph.node(state).depth {
            continue;
        }
        closed.insert(state);
        if *tree.marking(node) == problem.target {
            return SearchOutcome::success(monitor.steps(), tree.backtrack(node), graph);
        }

        let enabled = rule.enabled_transitions(tree.marking(node));
        if enabled.is_empty() {
            graph.mark_deadlock(state);
        }
        for transition in enabled {
            let next = rule.fire(tree.marking(node), transition);
            monitor.record_firing();
            if !graph.contains_marking(&next) && !monitor.admits(graph.node_count()) {
                graph.truncated = true;
                return SearchOutcome::aborted(monitor.steps(), graph);
            }
            let (child_state, fresh) = graph.insert(next.clone(), depth + 1);
            graph.add_edge(state, child_state, transition);
            if closed.contains(&child_state) {
                continue;
            }
            if fresh || depth + 1 < graph.node(child_state).depth {
                graph.graph[child_state].depth = depth + 1;
                let child = tree.push_child(node, transition, next);
                frontier.push(&mut tree, &estimator, child, child_state);
            }
        }
    }

    SearchOutcome::failure(monitor.steps(), graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::net::{Marking, Net, Place, PlaceId, Transition, TransitionId};
    use crate::search::{EventBus, SearchRequest, Status};
    use indexmap::IndexMap;

    fn problem(net: &Net, target: &[i64]) -> SearchProblem {
        let target = target
            .iter()
            .enumerate()
            .map(|(idx, tokens)| (PlaceId::new(idx as u32), *tokens))
            .collect::<IndexMap<_, _>>();
        SearchProblem::new(net, &SearchRequest::from_initial(net, target)).unwrap()
    }

    /// 从 `s` 到 `g`：`detour` 先到 `x` 再经 `finish` 到 `g`（两步），`direct` 一步。
    fn detour_net() -> Net {
        let mut net = Net::empty();
        let s = net.add_place(Place::new_with_tokens("s", 1));
        let x = net.add_place(Place::new("x"));
        let g = net.add_place(Place::new("g"));
        let detour = net.add_transition(Transition::new("detour"));
        let finish = net.add_transition(Transition::new("finish"));
        let direct = net.add_transition(Transition::new("direct"));
        net.add_input_arc(s, detour, 1).unwrap();
        net.add_output_arc(x, detour, 1).unwrap();
        net.add_input_arc(x, finish, 1).unwrap();
        net.add_output_arc(g, finish, 1).unwrap();
        net.add_input_arc(s, direct, 1).unwrap();
        net.add_output_arc(g, direct, 1).unwrap();
        net
    }

    /// 库所 `s a b c m g`。长路 `t1 t2 t3` 三步到 `m=3`，短路 `u1 u2` 两步到同一标识，
    /// 但 `c=2` 的距离大于 `a`、`b`，贪心搜索会先经长路发现 `m=3`。
    fn shortcut_net() -> Net {
        let mut net = Net::empty();
        let s = net.add_place(Place::new_with_tokens("s", 1));
        let a = net.add_place(Place::new("a"));
        let b = net.add_place(Place::new("b"));
        let c = net.add_place(Place::new("c"));
        let m = net.add_place(Place::new("m"));
        let g = net.add_place(Place::new("g"));
        let t1 = net.add_transition(Transition::new("t1"));
        let t2 = net.add_transition(Transition::new("t2"));
        let t3 = net.add_transition(Transition::new("t3"));
        let u1 = net.add_transition(Transition::new("u1"));
        let u2 = net.add_transition(Transition::new("u2"));
        let fin = net.add_transition(Transition::new("fin"));
        net.add_input_arc(s, t1, 1).unwrap();
        net.add_output_arc(a, t1, 1).unwrap();
        net.add_input_arc(a, t2, 1).unwrap();
        net.add_output_arc(b, t2, 1).unwrap();
        net.add_input_arc(b, t3, 1).unwrap();
        net.add_output_arc(m, t3, 3).unwrap();
        net.add_input_arc(s, u1, 1).unwrap();
        net.add_output_arc(c, u1, 2).unwrap();
        net.add_input_arc(c, u2, 2).unwrap();
        net.add_output_arc(m, u2, 3).unwrap();
        net.add_input_arc(m, fin, 3).unwrap();
        net.add_output_arc(g, fin, 1).unwrap();
        net
    }

    fn run_with(net: &Net, target: &[i64], heuristic: Heuristic, astar: bool) -> SearchOutcome {
        let bus = EventBus::new();
        let mut monitor = Monitor::new(&bus, &SearchConfig::default());
        run(&problem(net, target), &mut monitor, heuristic, astar)
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut heap = BinaryHeap::new();
        for (order, priority) in [(0, 2.0), (1, 1.0), (2, 1.0), (3, f64::INFINITY)] {
            heap.push(Entry {
                priority,
                order,
                node: NodeId::new(order as u32),
                state: NodeIndex::new(order as usize),
            });
        }
        let popped = std::iter::from_fn(|| heap.pop().map(|e| e.order)).collect::<Vec<_>>();
        assert_eq!(popped, vec![1, 2, 0, 3]);
    }

    #[test]
    fn astar_returns_shortest_path() {
        let net = detour_net();
        let outcome = run_with(&net, &[0, 0, 1], Heuristic::FiringBound, true);
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.backtrack, Some(vec![TransitionId::new(2)]));
        let goal = outcome
            .graph
            .index_of(&Marking::from_weights([0, 0, 1]))
            .unwrap();
        assert_eq!(outcome.graph.node(goal).depth, 1);
    }

    #[test]
    fn best_first_reaches_target() {
        let net = detour_net();
        let outcome = run_with(&net, &[0, 0, 1], Heuristic::TokenDistance, false);
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.backtrack, Some(vec![TransitionId::new(2)]));
    }

    #[test]
    fn shorter_path_replaces_unexpanded_entry() {
        let net = shortcut_net();
        let outcome = run_with(&net, &[0, 0, 0, 0, 0, 1], Heuristic::TokenDistance, false);
        assert_eq!(outcome.status, Status::Success);
        let names = outcome
            .backtrack
            .unwrap()
            .into_iter()
            .map(|t| net.transition_name(t).to_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["u1", "u2", "fin"]);

        let merged = outcome
            .graph
            .index_of(&Marking::from_weights([0, 0, 0, 0, 3, 0]))
            .unwrap();
        assert_eq!(outcome.graph.node(merged).depth, 2);
        // 长路上的 m=3 只入堆未展开，fin 只发射一次
        assert_eq!(outcome.steps, 6);
    }

    #[test]
    fn weighted_best_first_fails_on_unreachable_target() {
        let net = detour_net();
        let outcome = run_with(&net, &[0, 1, 1], Heuristic::WeightedTokenDistance, false);
        assert_eq!(outcome.status, Status::Failure);
        assert_eq!(outcome.graph.node_count(), 3);
    }
}
