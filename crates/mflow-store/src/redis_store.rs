//! Redis-backed job rows.
//!
//! Each job is a hash `{prefix}:job:{id}` with fields `status`, `data`
//! (the job as JSON) and `revision`. Guarded updates read the row, apply
//! the mutation locally and write it back with a Lua compare-and-set on
//! `revision`, retrying when another writer got there first.

use std::time::Duration;

use async_trait::async_trait;
use mflow_models::{Job, JobId, JobStatus};
use redis::Script;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::repo::{JobRepository, JobUpdate, Transition};

const INSERT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then return 0 end
redis.call('HSET', KEYS[1], 'status', ARGV[1], 'data', ARGV[2], 'revision', 1)
return 1
"#;

const SAVE_SCRIPT: &str = r#"
redis.call('HINCRBY', KEYS[1], 'revision', 1)
redis.call('HSET', KEYS[1], 'status', ARGV[1], 'data', ARGV[2])
return 1
"#;

const CAS_SCRIPT: &str = r#"
local rev = redis.call('HGET', KEYS[1], 'revision')
if rev ~= ARGV[1] then return 0 end
redis.call('HSET', KEYS[1], 'status', ARGV[2], 'data', ARGV[3], 'revision', tonumber(ARGV[1]) + 1)
return 1
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub redis_url: String,
    /// Key namespace.
    pub prefix: String,
    /// Attempts for an optimistic update before giving up.
    pub cas_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            prefix: "mflow".to_string(),
            cas_attempts: 5,
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            prefix: std::env::var("STORE_PREFIX").unwrap_or_else(|_| "mflow".to_string()),
            cas_attempts: std::env::var("STORE_CAS_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        }
    }
}

pub struct RedisJobRepository {
    client: redis::Client,
    config: StoreConfig,
}

impl RedisJobRepository {
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> StoreResult<Self> {
        Self::new(StoreConfig::from_env())
    }

    fn job_key(&self, id: &JobId) -> String {
        format!("{}:job:{}", self.config.prefix, id)
    }

    fn lease_key(&self, id: &JobId) -> String {
        format!("{}:lease:{}", self.config.prefix, id)
    }

    async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn read_row(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        id: &JobId,
    ) -> StoreResult<Option<(Job, String)>> {
        let (data, revision): (Option<String>, Option<String>) = redis::cmd("HMGET")
            .arg(self.job_key(id))
            .arg("data")
            .arg("revision")
            .query_async(conn)
            .await?;

        match (data, revision) {
            (Some(data), Some(revision)) => Ok(Some((serde_json::from_str(&data)?, revision))),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl JobRepository for RedisJobRepository {
    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>> {
        let mut conn = self.connection().await?;
        Ok(self.read_row(&mut conn, id).await?.map(|(job, _)| job))
    }

    async fn insert(&self, job: &Job) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let data = serde_json::to_string(job)?;
        let created: i32 = Script::new(INSERT_SCRIPT)
            .key(self.job_key(&job.id))
            .arg(job.status.as_str())
            .arg(data)
            .invoke_async(&mut conn)
            .await?;

        if created == 0 {
            return Err(StoreError::AlreadyExists(job.id.to_string()));
        }
        info!("Created job {} ({})", job.id, job.kind());
        Ok(())
    }

    async fn save(&self, job: &Job) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let data = serde_json::to_string(job)?;
        let _: i32 = Script::new(SAVE_SCRIPT)
            .key(self.job_key(&job.id))
            .arg(job.status.as_str())
            .arg(data)
            .invoke_async(&mut conn)
            .await?;
        debug!("Saved job {} as {}", job.id, job.status);
        Ok(())
    }

    async fn update_if(
        &self,
        id: &JobId,
        allowed: &[JobStatus],
        update: JobUpdate<'_>,
    ) -> StoreResult<Transition> {
        let mut conn = self.connection().await?;
        let cas = Script::new(CAS_SCRIPT);

        for attempt in 0..self.config.cas_attempts {
            let (current, revision) = self
                .read_row(&mut conn, id)
                .await?
                .ok_or_else(|| StoreError::not_found(id.as_str()))?;

            if !allowed.contains(&current.status) {
                debug!(
                    "Guarded update on job {} rejected in status {}",
                    id, current.status
                );
                return Ok(Transition::Rejected(current));
            }

            let next = update(current);
            let data = serde_json::to_string(&next)?;
            let applied: i32 = cas
                .key(self.job_key(id))
                .arg(&revision)
                .arg(next.status.as_str())
                .arg(data)
                .invoke_async(&mut conn)
                .await?;

            if applied == 1 {
                return Ok(Transition::Applied(next));
            }

            debug!(
                "Job {} revision changed under update (attempt {}), retrying",
                id,
                attempt + 1
            );
            tokio::time::sleep(Duration::from_millis(20 * (attempt as u64 + 1))).await;
        }

        warn!(
            "Guarded update on job {} failed after {} attempts",
            id, self.config.cas_attempts
        );
        Err(StoreError::conflict(format!(
            "job {} kept changing after {} attempts",
            id, self.config.cas_attempts
        )))
    }

    async fn try_lease(&self, id: &JobId, owner: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.lease_key(id))
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn release_lease(&self, id: &JobId, owner: &str) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: i32 = Script::new(RELEASE_SCRIPT)
            .key(self.lease_key(id))
            .arg(owner)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
