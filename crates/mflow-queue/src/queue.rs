//! Work queue contract.

use std::time::Duration;

use async_trait::async_trait;
use mflow_models::QueueMessage;

use crate::error::QueueResult;

/// A message handed to a consumer. It stays in the queue, invisible to
/// other consumers, until deleted or until its visibility timeout lapses.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    /// Queue-assigned id used for deletion.
    pub id: String,
    /// Raw JSON body.
    pub payload: String,
    /// Approximate number of times this message has been handed out, including now.
    pub delivery_count: u32,
}

impl ReceivedMessage {
    pub fn decode(&self) -> serde_json::Result<QueueMessage> {
        QueueMessage::from_json(&self.payload)
    }
}

/// At-least-once message queue with visibility timeout semantics.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Enqueue a message, returning its id.
    async fn send(&self, message: &QueueMessage) -> QueueResult<String>;

    /// Receive at most one message, waiting up to `wait` for one to arrive.
    async fn receive(&self, consumer: &str, wait: Duration) -> QueueResult<Option<ReceivedMessage>>;

    /// Remove a message permanently.
    async fn delete(&self, id: &str) -> QueueResult<()>;

    /// Restart the visibility timeout of a message `consumer` still holds,
    /// without counting another delivery.
    async fn extend_visibility(&self, consumer: &str, id: &str) -> QueueResult<()>;

    async fn ping(&self) -> QueueResult<()>;

    /// Deliveries allowed before a message is treated as poison.
    fn max_retries(&self) -> u32;
}
