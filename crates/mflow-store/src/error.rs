//! Job store error types.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("no job {0}")]
    NotFound(String),

    #[error("job {0} already exists")]
    AlreadyExists(String),

    /// Optimistic update lost the race on every attempt.
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("job record encoding: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
