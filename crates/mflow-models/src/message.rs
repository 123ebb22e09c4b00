//! Queue message wire format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::job::{Job, JobId, JobKind};

/// Reference to a job as carried on the queue.
///
/// Wire form is `{"jobId", "userId", "taskType", ...kind fields}`. Extra
/// fields are preserved in `fields` and never rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub job_id: JobId,

    pub user_id: String,

    /// Missing task types decode as `None` so the consumer can drop the
    /// message instead of failing to parse it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl QueueMessage {
    /// Build the reference message for a job.
    pub fn for_job(job: &Job) -> Self {
        let mut fields = job.params.to_wire();
        fields.insert(
            "originalFilePath".to_string(),
            Value::String(job.source_key.clone()),
        );
        Self {
            job_id: job.id.clone(),
            user_id: job.user_id.clone(),
            task_type: Some(job.kind().task_type().to_string()),
            fields,
        }
    }

    /// Resolve the task type tag, if present and known.
    pub fn kind(&self) -> Option<JobKind> {
        self.task_type.as_deref().and_then(JobKind::from_task_type)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{JobParams, SpeedParams};

    #[test]
    fn test_for_job_carries_reference_fields() {
        let job = Job::new(
            "user-9",
            "uploads/user-9/in.mp4",
            JobParams::SpeedChange(SpeedParams::new(2.0).with_quality("4k")),
        );
        let msg = QueueMessage::for_job(&job);
        let json: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(json["jobId"], Value::from(job.id.as_str()));
        assert_eq!(json["userId"], "user-9");
        assert_eq!(json["taskType"], "VIDEO_SPEED");
        assert_eq!(json["speed"], 2.0);
        assert_eq!(json["quality"], "4k");
        assert_eq!(json["originalFilePath"], "uploads/user-9/in.mp4");
        assert_eq!(msg.kind(), Some(JobKind::SpeedChange));
    }

    #[test]
    fn test_unknown_fields_are_kept() {
        let msg = QueueMessage::from_json(
            r#"{"jobId":"j1","userId":"u1","taskType":"VIDEO_FILTER","traceId":"abc"}"#,
        )
        .unwrap();
        assert_eq!(msg.kind(), Some(JobKind::Filter));
        assert_eq!(msg.fields.get("traceId"), Some(&Value::from("abc")));
    }

    #[test]
    fn test_missing_or_unknown_task_type() {
        let missing = QueueMessage::from_json(r#"{"jobId":"j1","userId":"u1"}"#).unwrap();
        assert!(missing.task_type.is_none());
        assert!(missing.kind().is_none());

        let unknown =
            QueueMessage::from_json(r#"{"jobId":"j1","userId":"u1","taskType":"PODCAST_CLIP"}"#)
                .unwrap();
        assert!(unknown.kind().is_none());
    }
}
