//! Job row persistence for the mediaflow pipeline.
//!
//! Jobs are the only shared mutable state between dispatchers and workers.
//! Plain saves are last-writer-wins; submission and worker-side status
//! changes go through guarded updates so a job never has two in-flight
//! messages.

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod repo;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryJobRepository;
pub use redis_store::{RedisJobRepository, StoreConfig};
pub use repo::{JobRepository, JobUpdate, Transition};
