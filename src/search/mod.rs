//! # 标识空间搜索
//!
//! 给定网、起始标识与目标标识，判断目标是否可达，或在穷举模式下构造完整的
//! 可达图 / 覆盖图。五种策略共用 [`FiringRule`] 与搜索树，区别只在前沿的排序方式
//! 与终止条件：
//!
//! | 策略 | 前沿 | 终止 |
//! |---|---|---|
//! | `BreadthFirst` | FIFO | 命中目标 / 前沿耗尽 |
//! | `BestFirst(h)` | 按 `h` 升序 | 同上 |
//! | `AStar(h)` | 按 `depth + h` 升序 | 同上 |
//! | `FullReachability` | FIFO，无目标检测 | 前沿耗尽 |
//! | `FullCoverability` | FIFO，ω 加宽 | 前沿耗尽（总能终止） |
//!
//! `steps` 统计迁移发射次数；每次出队前检查取消标志。
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};

use crate::analysis::firing::FiringRule;
use crate::analysis::heuristic::{Heuristic, normalize};
use crate::analysis::reachability::ReachabilityGraph;
use crate::config::SearchConfig;
use crate::net::{Marking, Net, PlaceId, TransitionId, Weight};

pub mod breadth_first;
pub mod controller;
pub mod error;
pub mod event;
pub mod full_graph;
pub mod priority;

pub use controller::Controller;
pub use error::SearchError;
pub use event::{
    CancelToken, EventBus, EventLog, FnListener, ListenerId, SearchEvent, SearchListener, Status,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    BreadthFirst,
    BestFirst(Heuristic),
    AStar(Heuristic),
    FullReachability,
    FullCoverability,
}

impl Strategy {
    /// 按名称选择策略；`heuristic` 为空时取该策略的默认启发式。
    ///
    /// 名称大小写、空白、`-`/`_` 不敏感，接受如 `"Breadth First Search"`、`"bfs"`、
    /// `"A*"`、`"FullReach"`、`"full-coverability"`。
    pub fn from_names(algorithm: &str, heuristic: Option<&str>) -> Result<Self, SearchError> {
        let resolve = |astar: bool, strategy: &str| match heuristic {
            None => Ok(Heuristic::default_for(astar)),
            Some(name) => Heuristic::from_name(name, astar).ok_or_else(|| {
                SearchError::UnknownHeuristic {
                    strategy: strategy.to_owned(),
                    heuristic: name.to_owned(),
                }
            }),
        };
        match normalize(algorithm).as_str() {
            "bfs" | "breadthfirst" | "breadthfirstsearch" => Ok(Strategy::BreadthFirst),
            "bestfirst" | "bestfirstsearch" | "greedy" => {
                Ok(Strategy::BestFirst(resolve(false, "Best First Search")?))
            }
            "a*" | "astar" => Ok(Strategy::AStar(resolve(true, "A*")?)),
            "fullreach" | "fullreachability" => Ok(Strategy::FullReachability),
            "fullcover" | "fullcoverability" => Ok(Strategy::FullCoverability),
            _ => Err(SearchError::UnknownStrategy(algorithm.to_owned())),
        }
    }

    /// 未显式指定启发式时使用配置中的默认名称。
    pub fn from_config(
        algorithm: &str,
        heuristic: Option<&str>,
        config: &SearchConfig,
    ) -> Result<Self, SearchError> {
        let fallback = match normalize(algorithm).as_str() {
            "a*" | "astar" => config.astar_heuristic.as_str(),
            _ => config.best_first_heuristic.as_str(),
        };
        Self::from_names(algorithm, Some(heuristic.unwrap_or(fallback)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::BreadthFirst => "Breadth First Search",
            Strategy::BestFirst(_) => "Best First Search",
            Strategy::AStar(_) => "A*",
            Strategy::FullReachability => "FullReach",
            Strategy::FullCoverability => "FullCover",
        }
    }

    pub fn heuristic(&self) -> Option<Heuristic> {
        match self {
            Strategy::BestFirst(h) | Strategy::AStar(h) => Some(*h),
            _ => None,
        }
    }

    /// 穷举模式不检测目标，构造完整的图。
    pub fn is_exhaustive(&self) -> bool {
        matches!(self, Strategy::FullReachability | Strategy::FullCoverability)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.heuristic() {
            Some(h) => write!(f, "{} ({h})", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

/// 按库所 ID 给出的搜索请求。
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub start: IndexMap<PlaceId, Weight>,
    pub target: IndexMap<PlaceId, Weight>,
    pub knockouts: IndexSet<TransitionId>,
    pub capacities: Option<IndexMap<PlaceId, Weight>>,
}

impl SearchRequest {
    pub fn new(start: IndexMap<PlaceId, Weight>, target: IndexMap<PlaceId, Weight>) -> Self {
        Self {
            start,
            target,
            knockouts: IndexSet::new(),
            capacities: None,
        }
    }

    /// 以网的初始标识为起点。
    pub fn from_initial(net: &Net, target: IndexMap<PlaceId, Weight>) -> Self {
        let start = net
            .places
            .iter_enumerated()
            .map(|(id, place)| (id, place.tokens))
            .collect();
        Self::new(start, target)
    }

    /// 穷举模式不使用目标，以起点占位。
    pub fn exhaustive(net: &Net) -> Self {
        let request = Self::from_initial(net, IndexMap::new());
        Self {
            target: request.start.clone(),
            ..request
        }
    }

    pub fn with_knockouts<I>(mut self, knockouts: I) -> Self
    where
        I: IntoIterator<Item = TransitionId>,
    {
        self.knockouts.extend(knockouts);
        self
    }

    pub fn with_capacities(mut self, capacities: IndexMap<PlaceId, Weight>) -> Self {
        self.capacities = Some(capacities);
        self
    }
}

/// 经过校验、可直接交给策略执行的搜索问题。
#[derive(Debug, Clone)]
pub struct SearchProblem {
    pub rule: FiringRule,
    pub start: Marking,
    pub target: Marking,
}

impl SearchProblem {
    /// 所有结构性错误都在这里报告，早于任何搜索开始。
    pub fn new(net: &Net, request: &SearchRequest) -> Result<Self, SearchError> {
        let mut rule =
            FiringRule::new(net)?.with_excluded(request.knockouts.iter().copied())?;
        if let Some(capacities) = &request.capacities {
            rule = rule.with_capacities(capacities)?;
        }
        let start = Marking::from_assignment(&net.places, &request.start)
            .map_err(SearchError::StartMarking)?;
        let target = Marking::from_assignment(&net.places, &request.target)
            .map_err(SearchError::TargetMarking)?;
        Ok(Self {
            rule,
            start,
            target,
        })
    }
}

/// 一次运行的结果；穷举模式下 `graph` 即答案，路径模式下为已探索部分。
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub status: Status,
    pub steps: usize,
    pub backtrack: Option<Vec<TransitionId>>,
    pub graph: ReachabilityGraph,
}

impl SearchOutcome {
    pub fn success(steps: usize, backtrack: Vec<TransitionId>, graph: ReachabilityGraph) -> Self {
        Self {
            status: Status::Success,
            steps,
            backtrack: Some(backtrack),
            graph,
        }
    }

    pub fn failure(steps: usize, graph: ReachabilityGraph) -> Self {
        Self::without_path(Status::Failure, steps, graph)
    }

    pub fn aborted(steps: usize, graph: ReachabilityGraph) -> Self {
        Self::without_path(Status::Aborted, steps, graph)
    }

    pub fn finished(steps: usize, graph: ReachabilityGraph) -> Self {
        Self::without_path(Status::Finished, steps, graph)
    }

    fn without_path(status: Status, steps: usize, graph: ReachabilityGraph) -> Self {
        Self {
            status,
            steps,
            backtrack: None,
            graph,
        }
    }

    pub fn event(&self) -> SearchEvent {
        let steps = self.steps;
        match self.status {
            Status::Success => SearchEvent::Success {
                steps,
                backtrack: self.backtrack.clone().unwrap_or_default(),
            },
            Status::Failure => SearchEvent::Failure { steps },
            Status::Aborted => SearchEvent::Aborted { steps },
            Status::Finished => SearchEvent::Finished { steps },
        }
    }

    /// 与实际送达的终止事件保持一致。
    fn reconcile(&mut self, delivered: Option<&SearchEvent>) {
        if let Some(SearchEvent::Aborted { .. }) = delivered {
            if self.status != Status::Aborted {
                self.status = Status::Aborted;
                self.backtrack = None;
            }
        }
    }
}

/// 策略与事件总线之间的桥：计步、进度上报、取消与状态上限。
pub struct Monitor<'a> {
    bus: &'a EventBus,
    progress_interval: usize,
    state_limit: Option<usize>,
    steps: usize,
}

impl<'a> Monitor<'a> {
    pub fn new(bus: &'a EventBus, config: &SearchConfig) -> Self {
        Self {
            bus,
            progress_interval: config.progress_interval,
            state_limit: config.state_limit,
            steps: 0,
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_interrupted(&self) -> bool {
        self.bus.is_cancelled()
    }

    pub fn record_firing(&mut self) {
        self.steps += 1;
        if self.progress_interval > 0 && self.steps % self.progress_interval == 0 {
            debug!("{} firings so far", self.steps);
            self.bus.emit(SearchEvent::Progress { steps: self.steps });
        }
    }

    /// 图中已有 `recorded` 个标识时能否再记录一个新的。
    pub fn admits(&self, recorded: usize) -> bool {
        self.state_limit.is_none_or(|limit| recorded < limit)
    }

    fn emit(&self, event: SearchEvent) -> Option<SearchEvent> {
        self.bus.emit(event)
    }
}

/// 在当前线程上执行一次搜索并发出完整的事件序列。
pub fn execute(
    strategy: Strategy,
    problem: &SearchProblem,
    monitor: &mut Monitor<'_>,
) -> SearchOutcome {
    info!(
        "{strategy}: {} places, {} transitions",
        problem.start.len(),
        problem.rule.transitions_len()
    );
    monitor.emit(SearchEvent::Started);

    let mut outcome = match strategy {
        Strategy::BreadthFirst => breadth_first::run(problem, monitor),
        Strategy::BestFirst(h) => priority::run(problem, monitor, h, false),
        Strategy::AStar(h) => priority::run(problem, monitor, h, true),
        Strategy::FullReachability => full_graph::run_reachability(problem, monitor),
        Strategy::FullCoverability => full_graph::run_coverability(problem, monitor),
    };

    if outcome.graph.truncated {
        warn!("state limit reached after {} markings", outcome.graph.node_count());
    }
    let delivered = monitor.emit(outcome.event());
    outcome.reconcile(delivered.as_ref());
    match outcome.status {
        Status::Aborted => warn!("{strategy} aborted after {} steps", outcome.steps),
        status => info!(
            "{strategy} {status:?} after {} steps, {} markings recorded",
            outcome.steps,
            outcome.graph.node_count()
        ),
    }
    outcome
}
