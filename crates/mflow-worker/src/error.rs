//! Worker error types.

use std::time::Duration;

use mflow_models::JobStatus;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{0}")]
    JobFailed(String),

    #[error("job exceeded its {0:?} budget")]
    Timeout(Duration),

    /// The row left PROCESSING while the attempt ran; its result was dropped.
    #[error("job moved to {0} before the result was recorded")]
    Superseded(JobStatus),

    #[error("bad worker configuration: {0}")]
    ConfigError(String),

    #[error("completion notice not delivered: {0}")]
    NotifyFailed(String),

    #[error("{0}")]
    Params(#[from] mflow_models::ParamsError),

    #[error("{0}")]
    Storage(#[from] mflow_storage::StorageError),

    #[error("{0}")]
    Media(#[from] mflow_media::MediaError),

    #[error("job store: {0}")]
    Store(#[from] mflow_store::StoreError),

    #[error("queue: {0}")]
    Queue(#[from] mflow_queue::QueueError),

    #[error("webhook: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scratch io: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Transient infrastructure faults worth another delivery.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Storage(e) => e.is_transfer(),
            WorkerError::Store(_) | WorkerError::Queue(_) | WorkerError::Io(_) => true,
            WorkerError::Timeout(_) => true,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            WorkerError::Storage(e) => e.is_not_found(),
            WorkerError::Store(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Message recorded on the failed job. Tool failures carry their stderr.
    pub fn diagnostic(&self) -> String {
        match self {
            WorkerError::Media(e) => e.diagnostic(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mflow_media::MediaError;
    use mflow_storage::StorageError;

    #[test]
    fn test_classification() {
        assert!(WorkerError::from(StorageError::transfer("reset")).is_retryable());
        assert!(!WorkerError::from(StorageError::not_found("k")).is_retryable());
        assert!(WorkerError::from(StorageError::not_found("k")).is_not_found());
        assert!(!WorkerError::job_failed("bad").is_retryable());
        assert!(!WorkerError::Superseded(JobStatus::Failed).is_retryable());
        assert!(WorkerError::Timeout(Duration::from_millis(1500)).is_retryable());
    }

    #[test]
    fn test_timeout_message_keeps_sub_second_budget() {
        let err = WorkerError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "job exceeded its 250ms budget");
    }

    #[test]
    fn test_diagnostic_carries_tool_stderr() {
        let err = WorkerError::from(MediaError::tool_failed("python3", Some(2), "Traceback: boom\n"));
        assert!(err.diagnostic().ends_with("Traceback: boom"));
    }
}
