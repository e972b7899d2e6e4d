use thiserror::Error;

use crate::net::{MarkingError, NetError};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("malformed net: {0}")]
    Net(#[from] NetError),
    #[error("invalid start marking: {0}")]
    StartMarking(#[source] MarkingError),
    #[error("invalid target marking: {0}")]
    TargetMarking(#[source] MarkingError),
    #[error("unknown search strategy `{0}`")]
    UnknownStrategy(String),
    #[error("heuristic `{heuristic}` is not available for {strategy}")]
    UnknownHeuristic { strategy: String, heuristic: String },
    #[error("search has already been started")]
    AlreadyStarted,
    #[error("search has not been started")]
    NotStarted,
    #[error("search outcome has already been taken")]
    OutcomeTaken,
    #[error("search worker panicked")]
    WorkerPanicked,
    #[error("failed to spawn search worker: {0}")]
    Spawn(#[source] std::io::Error),
}
