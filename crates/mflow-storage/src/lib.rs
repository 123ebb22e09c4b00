//! Object stage for the mediaflow pipeline.
//!
//! This crate provides:
//! - An `ObjectStore` abstraction with an R2 (S3 API) implementation
//! - Single-shot and multipart uploads
//! - Retrying downloads and availability polling
//! - CDN and presigned access URLs

pub mod client;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod retry;
pub mod stage;
pub mod store;
pub mod url;

pub use client::{R2Client, R2Config, LARGE_FILE_THRESHOLD};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use retry::{retry_async_if, Backoff, RetryConfig};
pub use stage::{guess_content_type, ObjectStage, RemoteObject, StageConfig};
pub use store::{ObjectMeta, ObjectStore, CACHE_CONTROL};
pub use url::{cdn_url, CdnConfig};
