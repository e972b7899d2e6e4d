//! Petri网有界性分析
//!
//! 两种方法：
//! 1. 半正 P-不变量覆盖全部库所时网必有界（需要 `invariants` 特性）
//! 2. 构造覆盖图，出现 ω 即无界，并给出到达第一个 ω 标识的见证序列
use std::fmt;

use indexmap::IndexSet;
use log::{debug, info};
use petgraph::algo::astar;

use crate::analysis::reachability::ReachabilityGraph;
use crate::config::SearchConfig;
use crate::net::{Net, PlaceId, TransitionId};
use crate::search::{
    EventBus, Monitor, SearchError, SearchOutcome, SearchProblem, SearchRequest, Status,
    Strategy, execute,
};

/// 有界性检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundnessResult {
    /// 网是有界的
    Bounded,
    /// 网是无界的
    Unbounded {
        /// 覆盖图中出现过 ω 的库所
        unbounded_places: Vec<PlaceId>,
        /// 从初始标识到第一个 ω 标识的迁移序列
        witness_sequence: Option<Vec<TransitionId>>,
    },
    /// 无法确定有界性（例如达到状态上限或被取消）
    Unknown { reason: String },
}

impl fmt::Display for BoundnessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundnessResult::Bounded => write!(f, "Petri网是有界的"),
            BoundnessResult::Unbounded {
                unbounded_places,
                witness_sequence,
            } => {
                write!(f, "Petri网是无界的，无界库所: {:?}", unbounded_places)?;
                if let Some(seq) = witness_sequence {
                    write!(f, "，见证序列: {:?}", seq)?;
                }
                Ok(())
            }
            BoundnessResult::Unknown { reason } => {
                write!(f, "无法确定有界性: {}", reason)
            }
        }
    }
}

impl BoundnessResult {
    /// 从一次覆盖图运行的结果得出结论。
    pub fn from_coverability(outcome: &SearchOutcome) -> Self {
        let graph = &outcome.graph;
        let unbounded_places = graph
            .markings()
            .flat_map(|marking| marking.omega_places())
            .collect::<IndexSet<_>>();

        if !unbounded_places.is_empty() {
            let mut unbounded_places = unbounded_places.into_iter().collect::<Vec<_>>();
            unbounded_places.sort();
            return BoundnessResult::Unbounded {
                unbounded_places,
                witness_sequence: omega_witness(graph),
            };
        }
        match outcome.status {
            Status::Finished => BoundnessResult::Bounded,
            Status::Aborted if graph.truncated => BoundnessResult::Unknown {
                reason: format!("超过状态限制，已记录 {} 个标识", graph.node_count()),
            },
            status => BoundnessResult::Unknown {
                reason: format!("覆盖图构造未完成: {status:?}"),
            },
        }
    }
}

/// 初始标识到最近的 ω 标识的最短迁移序列。
fn omega_witness(graph: &ReachabilityGraph) -> Option<Vec<TransitionId>> {
    let (_, path) = astar(
        &graph.graph,
        graph.initial,
        |node| graph.node(node).marking.has_omega(),
        |_| 1usize,
        |_| 0,
    )?;
    path.windows(2)
        .map(|pair| graph.edge_between(pair[0], pair[1]).map(|edge| edge.transition))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct BoundnessAnalyzer {
    config: SearchConfig,
}

impl BoundnessAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state_limit(mut self, limit: Option<usize>) -> Self {
        self.config.state_limit = limit;
        self
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// 使用P-不变量方法检查有界性
    #[cfg(feature = "invariants")]
    pub fn check_by_p_invariants(&self, net: &Net) -> BoundnessResult {
        use crate::analysis::invariants::compute_place_invariants;

        let invariants = compute_place_invariants(net);
        if invariants.is_empty() {
            return BoundnessResult::Unknown {
                reason: "没有找到P-不变量".to_string(),
            };
        }

        // 基向量整体取反后仍是不变量
        let mut covered = IndexSet::new();
        for invariant in &invariants {
            let signs = invariant.support().map(|(_, f)| f.signum()).collect::<IndexSet<_>>();
            if signs.len() == 1 {
                covered.extend(invariant.support().map(|(place, _)| place));
            }
        }
        if covered.len() == net.places_len() {
            debug!("{} semi-positive invariants cover every place", invariants.len());
            BoundnessResult::Bounded
        } else {
            BoundnessResult::Unknown {
                reason: format!(
                    "半正P-不变量只覆盖 {}/{} 个库所",
                    covered.len(),
                    net.places_len()
                ),
            }
        }
    }

    #[cfg(not(feature = "invariants"))]
    pub fn check_by_p_invariants(&self, _net: &Net) -> BoundnessResult {
        BoundnessResult::Unknown {
            reason: "需要启用invariants特性以使用P-不变量方法".to_string(),
        }
    }

    /// 在当前线程上构造覆盖图并据此判断
    pub fn check_by_coverability_tree(&self, net: &Net) -> Result<BoundnessResult, SearchError> {
        self.coverability_verdict(net, &SearchRequest::exhaustive(net))
    }

    fn coverability_verdict(
        &self,
        net: &Net,
        request: &SearchRequest,
    ) -> Result<BoundnessResult, SearchError> {
        let problem = SearchProblem::new(net, request)?;
        let bus = EventBus::new();
        let mut monitor = Monitor::new(&bus, &self.config);
        let outcome = execute(Strategy::FullCoverability, &problem, &mut monitor);
        let result = BoundnessResult::from_coverability(&outcome);
        info!("coverability graph with {} markings: {result}", outcome.graph.node_count());
        Ok(result)
    }

    /// 综合检查有界性（先不变量，后覆盖图）
    pub fn check(&self, net: &Net) -> Result<BoundnessResult, SearchError> {
        self.check_request(net, &SearchRequest::exhaustive(net))
    }

    /// 按搜索请求的起点、禁用迁移与容量检查有界性，目标被忽略。
    ///
    /// 覆盖全部库所的半正不变量对任意起点与任意受限的激发都成立，
    /// 因此不变量方法不需要看请求。
    pub fn check_request(
        &self,
        net: &Net,
        request: &SearchRequest,
    ) -> Result<BoundnessResult, SearchError> {
        let by_invariants = self.check_by_p_invariants(net);
        if by_invariants == BoundnessResult::Bounded {
            return Ok(by_invariants);
        }
        let request = SearchRequest {
            target: request.start.clone(),
            ..request.clone()
        };
        self.coverability_verdict(net, &request)
    }
}

/// 检查Petri网是否有界的便捷函数
pub fn check_boundness(net: &Net) -> Result<BoundnessResult, SearchError> {
    BoundnessAnalyzer::new().check(net)
}

/// 检查特定库所是否有界
pub fn check_place_boundness(net: &Net, place: PlaceId) -> Result<BoundnessResult, SearchError> {
    let result = match check_boundness(net)? {
        BoundnessResult::Unbounded {
            unbounded_places,
            witness_sequence,
        } if unbounded_places.contains(&place) => BoundnessResult::Unbounded {
            unbounded_places: vec![place],
            witness_sequence,
        },
        BoundnessResult::Unbounded { .. } => BoundnessResult::Bounded,
        other => other,
    };
    Ok(result)
}
