//! Matching error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    /// Malformed ingestion call: empty ids, empty attribute lists, bad deltas.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed recommend call: sub-list counts that do not match the arguments.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Storage collaborator failure, passed through untouched.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl MatchError {
    /// Stable machine-readable code used in driver responses.
    pub fn code(&self) -> &'static str {
        match self {
            MatchError::InvalidArgument(_) => "invalid_argument",
            MatchError::InvalidQuery(_) => "invalid_query",
            MatchError::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

impl From<redis::RedisError> for MatchError {
    fn from(err: redis::RedisError) -> Self {
        MatchError::StorageUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;
