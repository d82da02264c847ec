use consensus::{AuthError, ConsensusError};
use thiserror::Error;

use crate::sync::SyncError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("consensus error: {0}")]
    Consensus(#[from] ConsensusError),
    #[error("unauthorized: {0}")]
    Auth(#[from] AuthError),
    #[error("sync failed: {0}")]
    Sync(#[from] SyncError),
    #[error("ledger invariant violated: {0}")]
    Invalid(&'static str),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type NodeResult<T> = Result<T, NodeError>;
