//! 穷举模式：不检测目标，按 FIFO 展开直到前沿耗尽。
//!
//! 可达图对无界网不保证终止，只能靠取消或 `state_limit` 截断；
//! 覆盖图在发射后对搜索树路径上的祖先做 ω 加宽，总能终止。
use std::collections::VecDeque;

use crate::analysis::reachability::ReachabilityGraph;
use crate::analysis::search_tree::{NodeId, SearchTree};
use crate::net::{Marking, TransitionId};
use crate::search::{Monitor, SearchOutcome, SearchProblem};

pub(crate) fn run_reachability(
    problem: &SearchProblem,
    monitor: &mut Monitor<'_>,
) -> SearchOutcome {
    explore(problem, monitor, |tree, node, transition| {
        problem.rule.fire(tree.marking(node), transition)
    })
}

pub(crate) fn run_coverability(
    problem: &SearchProblem,
    monitor: &mut Monitor<'_>,
) -> SearchOutcome {
    explore(problem, monitor, |tree, node, transition| {
        let path = tree.path_to_root(node).map(|id| tree.marking(id));
        problem.rule.fire_omega(tree.marking(node), transition, path)
    })
}

fn explore<F>(problem: &SearchProblem, monitor: &mut Monitor<'_>, successor: F) -> SearchOutcome
where
    F: Fn(&SearchTree, NodeId, TransitionId) -> Marking,
{
    let mut tree = SearchTree::new(problem.start.clone());
    let mut graph = ReachabilityGraph::new(problem.start.clone());
    let mut queue = VecDeque::from([(tree.root(), graph.initial)]);

    while let Some((node, state)) = queue.pop_front() {
        if monitor.is_interrupted() {
            return SearchOutcome::aborted(monitor.steps(), graph);
        }
        let enabled = problem.rule.enabled_transitions(tree.marking(node));
        if enabled.is_empty() {
            graph.mark_deadlock(state);
        }
        let depth = tree.node(node).depth + 1;
        for transition in enabled {
            let next = successor(&tree, node, transition);
            monitor.record_firing();
            if !graph.contains_marking(&next) && !monitor.admits(graph.node_count()) {
                graph.truncated = true;
                return SearchOutcome::aborted(monitor.steps(), graph);
            }
            let (child_state, fresh) = graph.insert(next.clone(), depth);
            graph.add_edge(state, child_state, transition);
            if fresh {
                let child = tree.push_child(node, transition, next);
                queue.push_back((child, child_state));
            }
        }
    }

    SearchOutcome::finished(monitor.steps(), graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::net::{Net, Place, Tokens, Transition};
    use crate::search::{EventBus, SearchRequest, Status};

    fn problem(net: &Net) -> SearchProblem {
        SearchProblem::new(net, &SearchRequest::exhaustive(net)).unwrap()
    }

    fn with_monitor<R>(config: &SearchConfig, f: impl FnOnce(&mut Monitor<'_>) -> R) -> R {
        let bus = EventBus::new();
        let mut monitor = Monitor::new(&bus, config);
        f(&mut monitor)
    }

    /// 两个库所间来回搬运一个托肯。
    fn ping_pong() -> Net {
        let mut net = Net::empty();
        let a = net.add_place(Place::new_with_tokens("a", 1));
        let b = net.add_place(Place::new("b"));
        let go = net.add_transition(Transition::new("go"));
        let back = net.add_transition(Transition::new("back"));
        net.add_input_arc(a, go, 1).unwrap();
        net.add_output_arc(b, go, 1).unwrap();
        net.add_input_arc(b, back, 1).unwrap();
        net.add_output_arc(a, back, 1).unwrap();
        net
    }

    /// p 上一个托肯，t 消耗 1 产生 2。
    fn pump() -> Net {
        let mut net = Net::empty();
        let p = net.add_place(Place::new_with_tokens("p", 1));
        let t = net.add_transition(Transition::new("t"));
        net.add_input_arc(p, t, 1).unwrap();
        net.add_output_arc(p, t, 2).unwrap();
        net
    }

    #[test]
    fn reachability_of_cycle_finishes() {
        let net = ping_pong();
        let problem = problem(&net);
        let outcome = with_monitor(&SearchConfig::default(), |m| run_reachability(&problem, m));
        assert_eq!(outcome.status, Status::Finished);
        assert_eq!(outcome.graph.node_count(), 2);
        assert_eq!(outcome.graph.edge_count(), 2);
        assert_eq!(outcome.steps, 2);
        assert!(outcome.graph.deadlocks.is_empty());
    }

    #[test]
    fn coverability_widens_pump_to_omega() {
        let net = pump();
        let problem = problem(&net);
        let outcome = with_monitor(&SearchConfig::default(), |m| run_coverability(&problem, m));
        assert_eq!(outcome.status, Status::Finished);
        assert_eq!(outcome.steps, 2);
        let graph = &outcome.graph;
        assert_eq!(graph.node_count(), 2);
        let omega = graph
            .index_of(&Marking::new(vec![Tokens::Omega].into()))
            .unwrap();
        assert!(graph.edge_between(graph.initial, omega).is_some());
        assert!(graph.edge_between(omega, omega).is_some());
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn reachability_of_pump_is_cut_by_state_limit() {
        let net = pump();
        let problem = problem(&net);
        let config = SearchConfig {
            state_limit: Some(10),
            ..SearchConfig::default()
        };
        let outcome = with_monitor(&config, |m| run_reachability(&problem, m));
        assert_eq!(outcome.status, Status::Aborted);
        assert!(outcome.graph.truncated);
        assert_eq!(outcome.graph.node_count(), 10);
    }

    #[test]
    fn coverability_agrees_with_reachability_on_bounded_net() {
        let net = ping_pong();
        let problem = problem(&net);
        let reach = with_monitor(&SearchConfig::default(), |m| run_reachability(&problem, m));
        let cover = with_monitor(&SearchConfig::default(), |m| run_coverability(&problem, m));
        assert_eq!(reach.graph.node_count(), cover.graph.node_count());
        assert!(reach.graph.markings().all(|m| cover.graph.contains_marking(m)));
        assert_eq!(reach.graph.edge_count(), cover.graph.edge_count());
    }
}
