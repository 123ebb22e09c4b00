//! Job repository contract.

use std::time::Duration;

use async_trait::async_trait;
use mflow_models::{Job, JobId, JobStatus};

use crate::error::StoreResult;

/// Mutation applied to a job by [`JobRepository::update_if`].
pub type JobUpdate<'a> = &'a (dyn Fn(Job) -> Job + Send + Sync);

/// Outcome of a guarded update.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The guard held; carries the job as written.
    Applied(Job),
    /// The guard failed; carries the job as found, unchanged.
    Rejected(Job),
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }

    pub fn job(&self) -> &Job {
        match self {
            Transition::Applied(job) | Transition::Rejected(job) => job,
        }
    }

    pub fn into_job(self) -> Job {
        match self {
            Transition::Applied(job) | Transition::Rejected(job) => job,
        }
    }
}

/// Persistence for job rows.
///
/// `save` is last-writer-wins. Status transitions that must not race go
/// through `update_if`, which applies the mutation only while the stored
/// status is one of `allowed`.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>>;

    /// Create a new row. Fails with `AlreadyExists` if the id is taken.
    async fn insert(&self, job: &Job) -> StoreResult<()>;

    async fn save(&self, job: &Job) -> StoreResult<()>;

    async fn update_if(
        &self,
        id: &JobId,
        allowed: &[JobStatus],
        update: JobUpdate<'_>,
    ) -> StoreResult<Transition>;

    /// Take an exclusive, expiring processing lease. Returns false if held by someone else.
    async fn try_lease(&self, id: &JobId, owner: &str, ttl: Duration) -> StoreResult<bool>;

    /// Drop the lease if `owner` still holds it.
    async fn release_lease(&self, id: &JobId, owner: &str) -> StoreResult<()>;

    async fn ping(&self) -> StoreResult<()>;
}
