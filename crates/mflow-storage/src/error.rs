//! Storage error types.

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Object stage failures, split by whether retrying can help.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Missing or invalid endpoint/credentials. Fatal at startup.
    #[error("storage misconfigured: {0}")]
    ConfigError(String),

    #[error("no object at {0}")]
    NotFound(String),

    /// Network, permission or quota fault while moving bytes.
    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("local file: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(key: &str) -> Self {
        Self::NotFound(key.to_owned())
    }

    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::Transfer(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    /// Transfer-class errors are worth retrying locally.
    pub fn is_transfer(&self) -> bool {
        matches!(self, StorageError::Transfer(_) | StorageError::Io(_))
    }
}
