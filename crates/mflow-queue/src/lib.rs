//! Work queue for the mediaflow pipeline.
//!
//! Messages are minimal job references; the job row is the source of
//! truth. Delivery is at-least-once with a visibility timeout.

pub mod dispatcher;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod queue;
pub mod streams;

pub use dispatcher::{Dispatcher, SubmitOutcome};
pub use error::{QueueError, QueueResult};
pub use memory::MemoryQueue;
pub use queue::{MessageQueue, ReceivedMessage};
pub use streams::{QueueConfig, RedisStreamQueue};
