//! Error types for tool invocation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while preparing or running an external tool.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found")]
    ToolNotFound(String),

    #[error("{tool} exited with status {exit_code:?}")]
    ToolFailed {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Exit code was zero but the expected output is missing or empty.
    #[error("{tool} produced no output at {path}")]
    MissingOutput {
        tool: String,
        path: PathBuf,
        stderr: String,
    },

    #[error("{tool} timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Unreadable media metadata: {0}")]
    Metadata(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn tool_failed(tool: impl Into<String>, exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    /// Captured stderr, when the failure came from a finished process.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            MediaError::ToolFailed { stderr, .. } | MediaError::MissingOutput { stderr, .. } => {
                Some(stderr.as_str())
            }
            _ => None,
        }
    }

    /// Human-readable diagnostic suitable for the job's error message.
    pub fn diagnostic(&self) -> String {
        match self.stderr().map(str::trim) {
            Some(stderr) if !stderr.is_empty() => format!("{}: {}", self, stderr),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_includes_stderr() {
        let err = MediaError::tool_failed("ffmpeg", Some(1), "Invalid data found\n");
        assert_eq!(err.diagnostic(), "ffmpeg exited with status Some(1): Invalid data found");
    }

    #[test]
    fn test_diagnostic_without_stderr() {
        let err = MediaError::ToolNotFound("python3".into());
        assert_eq!(err.stderr(), None);
        assert_eq!(err.diagnostic(), "python3 not found");
    }
}
