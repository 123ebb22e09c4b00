//! Worker metrics.

use std::time::Duration;

use metrics::{counter, histogram};
use mflow_models::JobKind;

pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "mflow_worker_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "mflow_worker_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "mflow_worker_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "mflow_worker_job_duration_seconds";

    /// Messages dropped after exceeding the delivery ceiling.
    pub const POISON_MESSAGES_TOTAL: &str = "mflow_worker_poison_messages_total";

    /// Messages whose job was no longer `PROCESSING`.
    pub const STALE_MESSAGES_TOTAL: &str = "mflow_worker_stale_messages_total";

    /// Malformed or orphaned messages, by reason.
    pub const DISCARDED_MESSAGES_TOTAL: &str = "mflow_worker_discarded_messages_total";
}

pub fn record_job_started(kind: JobKind) {
    counter!(names::JOBS_STARTED_TOTAL, "kind" => kind.as_str()).increment(1);
}

pub fn record_job_completed(kind: JobKind, elapsed: Duration) {
    counter!(names::JOBS_COMPLETED_TOTAL, "kind" => kind.as_str()).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "kind" => kind.as_str()).record(elapsed.as_secs_f64());
}

pub fn record_job_failed(kind: JobKind, elapsed: Duration) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind.as_str()).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "kind" => kind.as_str()).record(elapsed.as_secs_f64());
}

pub fn record_poison() {
    counter!(names::POISON_MESSAGES_TOTAL).increment(1);
}

pub fn record_stale() {
    counter!(names::STALE_MESSAGES_TOTAL).increment(1);
}

pub fn record_discarded(reason: &'static str) {
    counter!(names::DISCARDED_MESSAGES_TOTAL, "reason" => reason).increment(1);
}
