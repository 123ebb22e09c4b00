//! In-process queue with visibility timeouts, used by tests and local runs.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mflow_models::QueueMessage;
use tokio::sync::Mutex;

use crate::error::{QueueError, QueueResult};
use crate::queue::{MessageQueue, ReceivedMessage};

#[derive(Debug)]
struct Entry {
    id: String,
    payload: String,
    delivery_count: u32,
    hidden_until: Option<Instant>,
}

#[derive(Debug)]
pub struct MemoryQueue {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
    failing_sends: AtomicU32,
    visibility_timeout: Duration,
    max_retries: u32,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), 3)
    }
}

impl MemoryQueue {
    pub fn new(visibility_timeout: Duration, max_retries: u32) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            failing_sends: AtomicU32::new(0),
            visibility_timeout,
            max_retries,
        }
    }

    /// Enqueue an arbitrary body, bypassing serialization.
    pub async fn push_raw(&self, payload: impl Into<String>) -> String {
        let id = format!("{}-0", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.entries.lock().await.push(Entry {
            id: id.clone(),
            payload: payload.into(),
            delivery_count: 0,
            hidden_until: None,
        });
        id
    }

    /// Messages still in the queue, visible or not.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Make every in-flight message visible again immediately.
    pub async fn expire_all(&self) {
        for entry in self.entries.lock().await.iter_mut() {
            entry.hidden_until = None;
        }
    }

    /// Make the next `n` sends fail.
    pub fn fail_next_sends(&self, n: u32) {
        self.failing_sends.store(n, Ordering::SeqCst);
    }

    async fn take_visible(&self) -> Option<ReceivedMessage> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.hidden_until.is_none_or(|until| until <= now))?;

        entry.delivery_count += 1;
        entry.hidden_until = Some(now + self.visibility_timeout);
        Some(ReceivedMessage {
            id: entry.id.clone(),
            payload: entry.payload.clone(),
            delivery_count: entry.delivery_count,
        })
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn send(&self, message: &QueueMessage) -> QueueResult<String> {
        let fail = self
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(QueueError::send_rejected("injected send fault"));
        }
        Ok(self.push_raw(message.to_json()?).await)
    }

    async fn receive(&self, _consumer: &str, wait: Duration) -> QueueResult<Option<ReceivedMessage>> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(message) = self.take_visible().await {
                return Ok(Some(message));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn delete(&self, id: &str) -> QueueResult<()> {
        self.entries.lock().await.retain(|e| e.id != id);
        Ok(())
    }

    async fn extend_visibility(&self, _consumer: &str, id: &str) -> QueueResult<()> {
        let hidden_until = Instant::now() + self.visibility_timeout;
        if let Some(entry) = self.entries.lock().await.iter_mut().find(|e| e.id == id) {
            entry.hidden_until = Some(hidden_until);
        }
        Ok(())
    }

    async fn ping(&self) -> QueueResult<()> {
        Ok(())
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_received_message_is_hidden() {
        let queue = MemoryQueue::default();
        queue.push_raw("{}").await;

        let first = queue.receive("c", Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(first.delivery_count, 1);
        assert!(queue.receive("c", Duration::ZERO).await.unwrap().is_none());
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_redelivery_after_visibility_timeout() {
        let queue = MemoryQueue::new(Duration::from_millis(1), 3);
        queue.push_raw("{}").await;

        queue.receive("c", Duration::ZERO).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let again = queue.receive("c", Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(again.delivery_count, 2);
    }

    #[tokio::test]
    async fn test_extend_visibility_keeps_message_hidden() {
        let queue = MemoryQueue::new(Duration::from_millis(30), 3);
        let id = queue.push_raw("{}").await;
        queue.receive("c", Duration::ZERO).await.unwrap().unwrap();

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(15)).await;
            assert_ok!(queue.extend_visibility("c", &id).await);
        }
        assert!(queue.receive("d", Duration::ZERO).await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(40)).await;
        let again = queue.receive("d", Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(again.delivery_count, 2);
    }

    #[tokio::test]
    async fn test_delete_removes() {
        let queue = MemoryQueue::default();
        let id = queue.push_raw("{}").await;
        assert_ok!(queue.delete(&id).await);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_receive_waits_then_gives_up() {
        let queue = MemoryQueue::default();
        let started = Instant::now();
        assert!(queue
            .receive("c", Duration::from_millis(20))
            .await
            .unwrap()
            .is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
