//! Queue and dispatch errors.

use mflow_models::ParamsError;
use mflow_store::StoreError;
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Broker unreachable or misconfigured.
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    /// The broker refused or lost a message on the way in.
    #[error("send rejected: {0}")]
    SendRejected(String),

    #[error("job rejected: {0}")]
    InvalidJob(#[from] ParamsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("message encoding: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn send_rejected(msg: impl Into<String>) -> Self {
        Self::SendRejected(msg.into())
    }
}
