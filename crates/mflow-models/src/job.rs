//! Job record and its status state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::params::JobParams;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted job status.
///
/// `COMPLETED` is accepted as an alias of `SUCCESS` when reading rows
/// written by older producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Source uploaded, never submitted.
    #[default]
    Uploaded,
    /// Submitted, waiting for a queue message to be sent.
    Pending,
    /// A queue message is in flight or a worker is running the job.
    Processing,
    /// Output uploaded and published.
    #[serde(alias = "COMPLETED")]
    Success,
    /// Attempt failed; `error_message` holds the reason.
    Failed,
}

impl JobStatus {
    /// Statuses from which a job may be (re-)submitted.
    ///
    /// A PENDING row has no message yet, so it is admitted; only
    /// PROCESSING rows are turned away.
    pub const SUBMITTABLE: [JobStatus; 4] = [
        JobStatus::Uploaded,
        JobStatus::Pending,
        JobStatus::Success,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Uploaded => "UPLOADED",
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
        }
    }

    /// A job in this state already owns a queue message.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }

    pub fn can_submit(&self) -> bool {
        Self::SUBMITTABLE.contains(self)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of transformation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Filter,
    SpeedChange,
    Compression,
    Conversion,
    BackgroundRemoval,
    DocumentOp,
    AspectRatio,
    Subtitles,
}

impl JobKind {
    pub const ALL: [JobKind; 8] = [
        JobKind::Filter,
        JobKind::SpeedChange,
        JobKind::Compression,
        JobKind::Conversion,
        JobKind::BackgroundRemoval,
        JobKind::DocumentOp,
        JobKind::AspectRatio,
        JobKind::Subtitles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Filter => "filter",
            JobKind::SpeedChange => "speed_change",
            JobKind::Compression => "compression",
            JobKind::Conversion => "conversion",
            JobKind::BackgroundRemoval => "background_removal",
            JobKind::DocumentOp => "document_op",
            JobKind::AspectRatio => "aspect_ratio",
            JobKind::Subtitles => "subtitles",
        }
    }

    /// Task type tag carried by queue messages.
    pub fn task_type(&self) -> &'static str {
        match self {
            JobKind::Filter => "VIDEO_FILTER",
            JobKind::SpeedChange => "VIDEO_SPEED",
            JobKind::Compression => "COMPRESSION",
            JobKind::Conversion => "MEDIA_CONVERSION",
            JobKind::BackgroundRemoval => "BACKGROUND_REMOVAL",
            JobKind::DocumentOp => "DOCUMENT_OPERATION",
            JobKind::AspectRatio => "ASPECT_RATIO",
            JobKind::Subtitles => "PROCESS_SUBTITLES",
        }
    }

    pub fn from_task_type(task_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.task_type() == task_type)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transformation job as persisted in the job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Owning user
    pub user_id: String,

    /// Kind-specific parameters
    pub params: JobParams,

    /// Object key of the source artifact
    pub source_key: String,

    /// Object key of the published output (set only on success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,

    /// Access URL of the published output (set only on success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,

    #[serde(default)]
    pub status: JobStatus,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a job for an already-uploaded source object.
    pub fn new(user_id: impl Into<String>, source_key: impl Into<String>, params: JobParams) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            user_id: user_id.into(),
            params,
            source_key: source_key.into(),
            output_key: None,
            output_url: None,
            status: JobStatus::Uploaded,
            progress: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.params.kind()
    }

    pub fn can_submit(&self) -> bool {
        self.status.can_submit()
    }

    /// Reset for a new attempt: progress, output and error are cleared.
    pub fn resubmit(mut self) -> Self {
        self.status = JobStatus::Pending;
        self.progress = 0;
        self.output_key = None;
        self.output_url = None;
        self.error_message = None;
        self.started_at = None;
        self.completed_at = None;
        self.updated_at = Utc::now();
        self
    }

    /// Hand the job over to the queue.
    pub fn start(mut self) -> Self {
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Mark job as successfully published.
    pub fn complete(mut self, output_key: impl Into<String>, output_url: impl Into<String>) -> Self {
        self.status = JobStatus::Success;
        self.output_key = Some(output_key.into());
        self.output_url = Some(output_url.into());
        self.error_message = None;
        self.progress = 100;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Mark job as failed. Progress drops back to 0 and no output is exposed.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.status = JobStatus::Failed;
        self.error_message = Some(error.into());
        self.progress = 0;
        self.output_key = None;
        self.output_url = None;
        self.updated_at = Utc::now();
        self
    }

    /// Update progress. Never moves backwards within an attempt.
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = self.progress.max(progress.min(100));
        self.updated_at = Utc::now();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{CompressionParams, JobParams};

    fn sample() -> Job {
        Job::new(
            "user123",
            "uploads/user123/clip.mp4",
            JobParams::Compression(CompressionParams::new("5MB")),
        )
    }

    #[test]
    fn test_new_job_is_uploaded() {
        let job = sample();
        assert_eq!(job.status, JobStatus::Uploaded);
        assert_eq!(job.kind(), JobKind::Compression);
        assert!(job.can_submit());
    }

    #[test]
    fn test_submit_guard() {
        assert!(JobStatus::Pending.can_submit());
        assert!(!JobStatus::Pending.is_in_flight());
        assert!(!JobStatus::Processing.can_submit());
        assert!(JobStatus::Processing.is_in_flight());
        assert!(JobStatus::Failed.can_submit());
        assert!(JobStatus::Success.can_submit());
        assert!(JobStatus::Uploaded.can_submit());
    }

    #[test]
    fn test_resubmit_resets_attempt_fields() {
        let done = sample().resubmit().start().with_progress(60).complete("out/key.mp4", "https://cdn/x");
        assert_eq!(done.status, JobStatus::Success);

        let again = done.resubmit();
        assert_eq!(again.status, JobStatus::Pending);
        assert_eq!(again.progress, 0);
        assert!(again.output_key.is_none());
        assert!(again.output_url.is_none());
        assert!(again.error_message.is_none());
    }

    #[test]
    fn test_progress_is_monotonic_and_capped() {
        let job = sample().start().with_progress(40).with_progress(20);
        assert_eq!(job.progress, 40);
        assert_eq!(job.with_progress(250).progress, 100);
    }

    #[test]
    fn test_fail_hides_output() {
        let job = sample().start().with_progress(80).fail("tool exited with 1");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 0);
        assert!(job.output_key.is_none());
        assert_eq!(job.error_message.as_deref(), Some("tool exited with 1"));
    }

    #[test]
    fn test_completed_alias_reads_as_success() {
        let status: JobStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(status, JobStatus::Success);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"SUCCESS\"");
    }

    #[test]
    fn test_task_type_round_trip() {
        for kind in JobKind::ALL {
            assert_eq!(JobKind::from_task_type(kind.task_type()), Some(kind));
        }
        assert_eq!(JobKind::from_task_type("VIDEO_EXPORT"), None);
    }
}
