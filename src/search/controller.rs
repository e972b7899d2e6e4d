//! 一次搜索的调度者：预检、后台工作线程、取消与监听者注册。
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use log::{info, warn};

use crate::analysis::invariants::{PlaceInvariant, check_place_invariants};
use crate::analysis::reachability::ReachabilityGraph;
use crate::config::SearchConfig;
use crate::net::{Marking, Net};
use crate::search::{
    EventBus, ListenerId, Monitor, SearchError, SearchEvent, SearchListener, SearchOutcome,
    SearchProblem, SearchRequest, Strategy, execute,
};

/// 每个控制器只负责一次运行，不在不同的起点/目标之间复用。
#[derive(Debug)]
pub struct Controller {
    problem: Arc<SearchProblem>,
    strategy: Strategy,
    config: SearchConfig,
    invariants: Vec<PlaceInvariant>,
    bus: Arc<EventBus>,
    worker: Option<JoinHandle<SearchOutcome>>,
    outcome: Option<SearchOutcome>,
    started: bool,
}

impl Controller {
    /// 校验网与请求；所有输入错误都在这里返回，早于任何工作线程。
    pub fn new(
        net: &Net,
        request: &SearchRequest,
        strategy: Strategy,
    ) -> Result<Self, SearchError> {
        let problem = SearchProblem::new(net, request)?;
        Ok(Self {
            problem: Arc::new(problem),
            strategy,
            config: SearchConfig::default(),
            invariants: Vec::new(),
            bus: Arc::new(EventBus::new()),
            worker: None,
            outcome: None,
            started: false,
        })
    }

    /// 按名称选择策略与启发式后构造控制器。
    pub fn start(
        net: &Net,
        request: &SearchRequest,
        algorithm: &str,
        heuristic: Option<&str>,
    ) -> Result<Self, SearchError> {
        let strategy = Strategy::from_names(algorithm, heuristic)?;
        Self::new(net, request, strategy)
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_invariants(mut self, invariants: Vec<PlaceInvariant>) -> Self {
        self.invariants = invariants;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn problem(&self) -> &SearchProblem {
        &self.problem
    }

    pub fn add_listener<L>(&self, listener: L) -> ListenerId
    where
        L: SearchListener + 'static,
    {
        self.bus.add_listener(Arc::new(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.bus.remove_listener(id)
    }

    /// 以通道接收本次运行的全部事件。
    pub fn subscribe(&self) -> Receiver<SearchEvent> {
        let (sender, receiver) = mpsc::channel();
        self.add_listener(sender);
        receiver
    }

    /// `false` 表示目标必不可达。
    pub fn check_pis(invariants: &[PlaceInvariant], start: &Marking, target: &Marking) -> bool {
        check_place_invariants(invariants, start, target)
    }

    /// 启动后台搜索并立即返回。
    ///
    /// 路径类策略在预检失败时不启动线程，直接在调用线程上发出 `Started` 与 `Failure`。
    pub fn run(&mut self) -> Result<(), SearchError> {
        if self.started {
            return Err(SearchError::AlreadyStarted);
        }
        self.started = true;

        let problem = &self.problem;
        if !self.strategy.is_exhaustive()
            && !Self::check_pis(&self.invariants, &problem.start, &problem.target)
        {
            warn!("target {} is excluded by a place invariant", problem.target);
            self.bus.emit(SearchEvent::Started);
            let delivered = self.bus.emit(SearchEvent::Failure { steps: 0 });
            let graph = ReachabilityGraph::new(problem.start.clone());
            let mut outcome = SearchOutcome::failure(0, graph);
            outcome.reconcile(delivered.as_ref());
            self.outcome = Some(outcome);
            return Ok(());
        }

        let problem = Arc::clone(&self.problem);
        let bus = Arc::clone(&self.bus);
        let config = self.config.clone();
        let strategy = self.strategy;
        let handle = thread::Builder::new()
            .name("pn-search".to_owned())
            .spawn(move || {
                let mut monitor = Monitor::new(&bus, &config);
                execute(strategy, &problem, &mut monitor)
            })
            .map_err(SearchError::Spawn)?;
        info!("{} worker spawned", self.strategy);
        self.worker = Some(handle);
        Ok(())
    }

    /// 请求取消。返回后只可能再收到一个 `Aborted`。
    pub fn stop_algorithm(&self) {
        if self.bus.is_terminated() {
            return;
        }
        warn!("{} interrupted", self.strategy);
        self.bus.interrupt();
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// 等待工作线程结束并取回结果。
    pub fn join(&mut self) -> Result<SearchOutcome, SearchError> {
        if let Some(outcome) = self.outcome.take() {
            return Ok(outcome);
        }
        match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| SearchError::WorkerPanicked),
            None if self.started => Err(SearchError::OutcomeTaken),
            None => Err(SearchError::NotStarted),
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.bus.token().cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Place, PlaceId, Transition};
    use crate::search::{EventLog, Status};
    use indexmap::IndexMap;

    fn transfer() -> Net {
        let mut net = Net::empty();
        let p1 = net.add_place(Place::new_with_tokens("p1", 1));
        let p2 = net.add_place(Place::new("p2"));
        let t1 = net.add_transition(Transition::new("t1"));
        net.add_input_arc(p1, t1, 1).unwrap();
        net.add_output_arc(p2, t1, 1).unwrap();
        net
    }

    fn target(p1: i64, p2: i64) -> IndexMap<PlaceId, i64> {
        IndexMap::from([(PlaceId::new(0), p1), (PlaceId::new(1), p2)])
    }

    #[test]
    fn run_twice_is_rejected() {
        let net = transfer();
        let request = SearchRequest::from_initial(&net, target(0, 1));
        let mut controller = Controller::start(&net, &request, "bfs", None).unwrap();
        controller.run().unwrap();
        assert!(matches!(controller.run(), Err(SearchError::AlreadyStarted)));
        let outcome = controller.join().unwrap();
        assert_eq!(outcome.status, Status::Success);
        assert!(matches!(controller.join(), Err(SearchError::OutcomeTaken)));
    }

    #[test]
    fn join_before_run_is_an_error() {
        let net = transfer();
        let request = SearchRequest::from_initial(&net, target(0, 1));
        let mut controller = Controller::start(&net, &request, "bfs", None).unwrap();
        assert!(matches!(controller.join(), Err(SearchError::NotStarted)));
    }

    #[test]
    fn failed_precheck_skips_worker() {
        let net = transfer();
        let request = SearchRequest::from_initial(&net, target(0, 2));
        let invariant = PlaceInvariant::from_dense(&[1, 1]);
        let mut controller = Controller::start(&net, &request, "A*", None)
            .unwrap()
            .with_invariants(vec![invariant]);
        let log = Arc::new(EventLog::new());
        controller.add_listener(log.clone());
        controller.run().unwrap();
        assert!(!controller.is_running());
        assert_eq!(
            log.events(),
            vec![SearchEvent::Started, SearchEvent::Failure { steps: 0 }]
        );
        let outcome = controller.join().unwrap();
        assert_eq!(outcome.steps, 0);
        assert_eq!(outcome.graph.node_count(), 1);
    }

    #[test]
    fn unknown_names_fail_before_any_worker() {
        let net = transfer();
        let request = SearchRequest::from_initial(&net, target(0, 1));
        assert!(matches!(
            Controller::start(&net, &request, "dijkstra", None),
            Err(SearchError::UnknownStrategy(_))
        ));
        let partial = SearchRequest::new(target(1, 0), IndexMap::from([(PlaceId::new(0), 0)]));
        assert!(matches!(
            Controller::start(&net, &partial, "bfs", None),
            Err(SearchError::TargetMarking(_))
        ));
    }
}
