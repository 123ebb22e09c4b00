//! Job submission.
//!
//! Submitting moves a job into `PROCESSING` with a guarded update and then
//! sends its queue message. The guard admits every status except
//! `PROCESSING`, so a job that already has a message in flight is returned
//! unchanged instead of being queued twice, while a `PENDING` row left by an
//! interrupted submission can still be enqueued. If the send fails the job
//! is rolled back to `FAILED`.

use std::sync::Arc;

use mflow_models::{Job, JobId, JobStatus, QueueMessage};
use mflow_store::{JobRepository, Transition};
use tracing::{error, info, warn};

use crate::error::QueueResult;
use crate::metrics;
use crate::queue::MessageQueue;

/// Result of a submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The job was moved to `PROCESSING` and its message sent.
    Enqueued { job: Job, message_id: String },
    /// The job already had a message in flight; nothing changed.
    AlreadyInFlight(Job),
}

impl SubmitOutcome {
    pub fn job(&self) -> &Job {
        match self {
            SubmitOutcome::Enqueued { job, .. } | SubmitOutcome::AlreadyInFlight(job) => job,
        }
    }

    pub fn is_enqueued(&self) -> bool {
        matches!(self, SubmitOutcome::Enqueued { .. })
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    repo: Arc<dyn JobRepository>,
    queue: Arc<dyn MessageQueue>,
}

impl Dispatcher {
    pub fn new(repo: Arc<dyn JobRepository>, queue: Arc<dyn MessageQueue>) -> Self {
        Self { repo, queue }
    }

    /// Persist a new job and submit it.
    pub async fn create_and_submit(&self, job: Job) -> QueueResult<SubmitOutcome> {
        job.params.validate()?;
        self.repo.insert(&job).await?;
        self.submit(&job.id).await
    }

    /// Submit or re-submit an existing job.
    pub async fn submit(&self, id: &JobId) -> QueueResult<SubmitOutcome> {
        let transition = self
            .repo
            .update_if(id, &JobStatus::SUBMITTABLE, &|job: Job| job.resubmit().start())
            .await?;

        let job = match transition {
            Transition::Applied(job) => job,
            Transition::Rejected(job) => {
                info!(
                    "Job {} is already {}, not enqueueing again",
                    job.id, job.status
                );
                metrics::record_submission("in_flight");
                return Ok(SubmitOutcome::AlreadyInFlight(job));
            }
        };

        let message = QueueMessage::for_job(&job);
        match self.queue.send(&message).await {
            Ok(message_id) => {
                metrics::record_submission("enqueued");
                Ok(SubmitOutcome::Enqueued { job, message_id })
            }
            Err(e) => {
                error!("Failed to enqueue job {}: {}", job.id, e);
                metrics::record_submission("send_failed");
                let reason = format!("Failed to enqueue job: {}", e);
                let rollback = move |job: Job| job.fail(reason.clone());
                if let Err(rollback_err) = self
                    .repo
                    .update_if(id, &[JobStatus::Processing], &rollback)
                    .await
                {
                    warn!("Failed to roll back job {}: {}", id, rollback_err);
                }
                Err(e)
            }
        }
    }
}
