use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing access key or requester address")]
    MissingCredentials,
    #[error("invalid access key")]
    InvalidKey,
    #[error("a node may not authorize itself")]
    SelfAuthorization,
}
