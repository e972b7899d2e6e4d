//! 广度优先：FIFO 前沿，首次命中的路径发射次数最少。
use std::collections::VecDeque;

use crate::analysis::reachability::ReachabilityGraph;
use crate::analysis::search_tree::SearchTree;
use crate::search::{Monitor, SearchOutcome, SearchProblem};

pub(crate) fn run(problem: &SearchProblem, monitor: &mut Monitor<'_>) -> SearchOutcome {
    let rule = &problem.rule;
    let mut tree = SearchTree::new(problem.start.clone());
    let mut graph = ReachabilityGraph::new(problem.start.clone());
    let mut queue = VecDeque::from([(tree.root(), graph.initial)]);

    while let Some((node, state)) = queue.pop_front() {
        if monitor.is_interrupted() {
            return SearchOutcome::aborted(monitor.steps(), graph);
        }
        if *tree.marking(node) == problem.target {
            return SearchOutcome::success(monitor.steps(), tree.backtrack(node), graph);
        }

        let enabled = rule.enabled_transitions(tree.marking(node));
        if enabled.is_empty() {
            graph.mark_deadlock(state);
        }
        let depth = tree.node(node).depth + 1;
        for transition in enabled {
            let next = rule.fire(tree.marking(node), transition);
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

    /// a -> b 有两条路线：t_long 经 m 两步，t_short 一步。
    fn diamond() -> Net {
        let mut net = Net::empty();
        let a = net.add_place(Place::new_with_tokens("a", 1));
        let m = net.add_place(Place::new("m"));
        let b = net.add_place(Place::new("b"));
        let t_long = net.add_transition(Transition::new("t_long"));
        let t_mid = net.add_transition(Transition::new("t_mid"));
        let t_short = net.add_transition(Transition::new("t_short"));
        net.add_input_arc(a, t_long, 1).unwrap();
        net.add_output_arc(m, t_long, 1).unwrap();
        net.add_input_arc(m, t_mid, 1).unwrap();
        net.add_output_arc(b, t_mid, 1).unwrap();
        net.add_input_arc(a, t_short, 1).unwrap();
        net.add_output_arc(b, t_short, 1).unwrap();
        net
    }

    #[test]
    fn finds_fewest_firings() {
        let net = diamond();
        let bus = EventBus::new();
        let mut monitor = Monitor::new(&bus, &SearchConfig::default());
        let outcome = run(&problem(&net, &[0, 0, 1]), &mut monitor);
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.backtrack, Some(vec![TransitionId::new(2)]));
    }

    #[test]
    fn start_equal_to_target_needs_no_firing() {
        let net = diamond();
        let bus = EventBus::new();
        let mut monitor = Monitor::new(&bus, &SearchConfig::default());
        let outcome = run(&problem(&net, &[1, 0, 0]), &mut monitor);
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.steps, 0);
        assert_eq!(outcome.backtrack, Some(vec![]));
    }

    #[test]
    fn exhausts_and_records_explored_markings() {
        let net = diamond();
        let bus = EventBus::new();
        let mut monitor = Monitor::new(&bus, &SearchConfig::default());
        let outcome = run(&problem(&net, &[0, 1, 1]), &mut monitor);
        assert_eq!(outcome.status, Status::Failure);
        assert_eq!(outcome.graph.node_count(), 3);
        assert!(outcome.graph.contains_marking(&Marking::from_weights([0, 1, 0])));
        assert_eq!(outcome.graph.stats().deadlock_count, 1);
    }

    #[test]
    fn state_limit_aborts_and_truncates() {
        let net = diamond();
        let bus = EventBus::new();
        let config = SearchConfig {
            state_limit: Some(1),
            ..SearchConfig::default()
        };
        let mut monitor = Monitor::new(&bus, &config);
        let outcome = run(&problem(&net, &[0, 0, 1]), &mut monitor);
        assert_eq!(outcome.status, Status::Aborted);
        assert!(outcome.graph.truncated);
        assert_eq!(outcome.graph.node_count(), 1);
    }

    #[test]
    fn cancelled_before_first_pop() {
        let net = diamond();
        let bus = EventBus::new();
        bus.interrupt();
        let mut monitor = Monitor::new(&bus, &SearchConfig::default());
        let outcome = run(&problem(&net, &[0, 0, 1]), &mut monitor);
        assert_eq!(outcome.status, Status::Aborted);
        assert_eq!(outcome.steps, 0);
    }
}
