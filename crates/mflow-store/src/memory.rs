//! In-process job repository used by tests and local runs.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mflow_models::{Job, JobId, JobStatus};
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::repo::{JobRepository, JobUpdate, Transition};

#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: Mutex<HashMap<JobId, Job>>,
    leases: Mutex<HashMap<JobId, (String, Instant)>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>> {
        Ok(self.jobs.lock().await.get(id).cloned())
    }

    async fn insert(&self, job: &Job) -> StoreResult<()> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id.to_string()));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn save(&self, job: &Job) -> StoreResult<()> {
        self.jobs.lock().await.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn update_if(
        &self,
        id: &JobId,
        allowed: &[JobStatus],
        update: JobUpdate<'_>,
    ) -> StoreResult<Transition> {
        let mut jobs = self.jobs.lock().await;
        let current = jobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id.as_str()))?;

        if !allowed.contains(&current.status) {
            return Ok(Transition::Rejected(current));
        }

        let next = update(current);
        jobs.insert(id.clone(), next.clone());
        Ok(Transition::Applied(next))
    }

    async fn try_lease(&self, id: &JobId, owner: &str, ttl: Duration) -> StoreResult<bool> {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();
        match leases.get(id) {
            Some((_, expires)) if *expires > now => Ok(false),
            _ => {
                leases.insert(id.clone(), (owner.to_string(), now + ttl));
                Ok(true)
            }
        }
    }

    async fn release_lease(&self, id: &JobId, owner: &str) -> StoreResult<()> {
        let mut leases = self.leases.lock().await;
        if leases.get(id).is_some_and(|(holder, _)| holder == owner) {
            leases.remove(id);
        }
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
