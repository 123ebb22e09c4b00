//! Completion notification.
//!
//! Owners learn about finished jobs by reading the job row; this is an
//! additional push. Delivery is best-effort: it runs in the background and
//! its failures are only logged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mflow_models::{Job, JobId, JobKind, JobStatus};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};

/// Payload describing a job that reached a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub job_id: JobId,
    pub user_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CompletionEvent {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            user_id: job.user_id.clone(),
            kind: job.kind(),
            status: job.status,
            output_url: job.output_url.clone(),
            error_message: job.error_message.clone(),
        }
    }
}

#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify(&self, event: &CompletionEvent) -> WorkerResult<()>;
}

/// Writes the event to the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl CompletionNotifier for LogNotifier {
    async fn notify(&self, event: &CompletionEvent) -> WorkerResult<()> {
        info!(
            job_id = %event.job_id,
            user_id = %event.user_id,
            kind = %event.kind,
            status = %event.status,
            "Job finished"
        );
        Ok(())
    }
}

/// POSTs the event as JSON.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> WorkerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CompletionNotifier for WebhookNotifier {
    async fn notify(&self, event: &CompletionEvent) -> WorkerResult<()> {
        let response = self.client.post(&self.url).json(event).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::NotifyFailed(format!(
                "webhook returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// Fire-and-forget delivery.
pub fn notify_in_background(notifier: Arc<dyn CompletionNotifier>, job: &Job) {
    let event = CompletionEvent::from_job(job);
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&event).await {
            warn!("Completion notification for job {} failed: {}", event.job_id, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use mflow_models::{CompressionParams, JobParams};
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn finished_job() -> Job {
        Job::new(
            "user-3",
            "Compression/original/user-3/a.mp4",
            JobParams::Compression(CompressionParams::new("5MB")),
        )
        .start()
        .complete("Compression/processed/user-3/compressed_1_a.mp4", "https://cdn/x")
    }

    #[test]
    fn test_event_wire_shape() {
        let event = CompletionEvent::from_job(&finished_job());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["userId"], "user-3");
        assert_eq!(json["status"], "SUCCESS");
        assert_eq!(json["outputUrl"], "https://cdn/x");
        assert!(json.get("errorMessage").is_none());
    }

    #[tokio::test]
    async fn test_log_notifier() {
        let event = CompletionEvent::from_job(&finished_job());
        assert_ok!(LogNotifier.notify(&event).await);
    }

    async fn hook_server(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_webhook_posts_event() {
        let server = hook_server(204).await;
        let notifier = WebhookNotifier::new(format!("{}/hook", server.uri())).unwrap();
        let event = CompletionEvent::from_job(&finished_job());

        assert_ok!(notifier.notify(&event).await);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["status"], "SUCCESS");
        assert_eq!(body["kind"], serde_json::to_value(JobKind::Compression).unwrap());
    }

    #[tokio::test]
    async fn test_webhook_error_status() {
        let server = hook_server(500).await;
        let notifier = WebhookNotifier::new(format!("{}/hook", server.uri())).unwrap();
        let event = CompletionEvent::from_job(&finished_job());
        let err = assert_err!(notifier.notify(&event).await);
        assert!(matches!(err, WorkerError::NotifyFailed(_)));
    }
}
