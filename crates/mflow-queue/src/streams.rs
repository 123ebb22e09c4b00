//! Work queue on Redis Streams.
//!
//! Messages are stream entries read through a consumer group. An entry is
//! pending from the moment it is read until it is acknowledged and
//! deleted; entries left pending longer than the visibility timeout are
//! reclaimed by the next consumer that polls, which gives redelivery after
//! a crash or a failed attempt. The delivery count comes from the pending
//! entries list.

use std::time::Duration;

use async_trait::async_trait;
use mflow_models::QueueMessage;
use redis::streams::{StreamAutoClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::metrics;
use crate::queue::{MessageQueue, ReceivedMessage};

const PAYLOAD_FIELD: &str = "message";

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    pub stream_name: String,
    pub consumer_group: String,
    /// Deliveries allowed before a message is treated as poison.
    pub max_retries: u32,
    /// How long a received message stays hidden before it can be reclaimed.
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "mflow:jobs".to_string(),
            consumer_group: "mflow:workers".to_string(),
            max_retries: 3,
            visibility_timeout: Duration::from_secs(30),
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            visibility_timeout: std::env::var("QUEUE_VISIBILITY_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.visibility_timeout),
        }
    }
}

pub struct RedisStreamQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl RedisStreamQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::unavailable(e.to_string()))
    }

    /// Create the consumer group if it does not exist yet.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Claim one entry that has been pending longer than the visibility timeout.
    async fn reclaim(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        consumer: &str,
    ) -> QueueResult<Option<StreamId>> {
        let reply: StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg(self.config.visibility_timeout.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(1)
            .query_async(conn)
            .await?;

        if !reply.deleted_ids.is_empty() {
            debug!("Skipped {} pending entries no longer in the stream", reply.deleted_ids.len());
        }
        Ok(reply.claimed.into_iter().next())
    }

    async fn read_new(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        consumer: &str,
        wait: Duration,
    ) -> QueueResult<Option<StreamId>> {
        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(wait.as_millis() as u64)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(conn)
            .await?;

        Ok(reply
            .into_iter()
            .flat_map(|r| r.keys)
            .flat_map(|k| k.ids)
            .next())
    }

    async fn delivery_count(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        id: &str,
    ) -> QueueResult<u32> {
        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(id)
            .arg(id)
            .arg(1)
            .query_async(conn)
            .await?;

        Ok(pending
            .ids
            .first()
            .map(|p| p.times_delivered as u32)
            .unwrap_or(1))
    }
}

#[async_trait]
impl MessageQueue for RedisStreamQueue {
    async fn send(&self, message: &QueueMessage) -> QueueResult<String> {
        let mut conn = self.connection().await?;
        let payload = message.to_json()?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::send_rejected(e.to_string()))?;

        metrics::record_sent(message.task_type.as_deref());
        info!(
            "Enqueued job {} with message ID {}",
            message.job_id, message_id
        );
        Ok(message_id)
    }

    async fn receive(&self, consumer: &str, wait: Duration) -> QueueResult<Option<ReceivedMessage>> {
        let mut conn = self.connection().await?;

        let entry = match self.reclaim(&mut conn, consumer).await? {
            Some(entry) => {
                debug!("Reclaimed idle message {}", entry.id);
                Some(entry)
            }
            None => self.read_new(&mut conn, consumer, wait).await?,
        };

        let Some(entry) = entry else {
            return Ok(None);
        };

        let payload = match entry.map.get(PAYLOAD_FIELD) {
            Some(value) => redis::from_redis_value::<String>(value)?,
            None => {
                warn!("Message {} has no payload field", entry.id);
                String::new()
            }
        };
        let delivery_count = self.delivery_count(&mut conn, &entry.id).await?;
        metrics::record_received(delivery_count);

        Ok(Some(ReceivedMessage {
            id: entry.id,
            payload,
            delivery_count,
        }))
    }

    async fn delete(&self, id: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Deleted message {}", id);
        Ok(())
    }

    async fn extend_visibility(&self, consumer: &str, id: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        // XCLAIM with a zero idle floor resets the entry's idle time.
        // JUSTID leaves the delivery counter alone.
        let kept: Vec<String> = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg(0)
            .arg(id)
            .arg("JUSTID")
            .query_async(&mut conn)
            .await?;

        if kept.is_empty() {
            warn!("Message {} is no longer pending, heartbeat had no effect", id);
        }
        Ok(())
    }

    async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}
