//! Object store abstraction.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Cache-Control applied to every published object (30 days).
pub const CACHE_CONTROL: &str = "max-age=2592000";

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    /// Size in bytes (content length)
    pub size: u64,
}

/// Remote object store.
///
/// Every method performs exactly one attempt; retry policy lives in
/// [`crate::ObjectStage`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Object metadata, or `None` if the key does not exist.
    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>>;

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.head(key).await?.is_some())
    }

    /// Download an object to a local file, creating parent directories.
    async fn download_to(&self, key: &str, path: &Path) -> StorageResult<()>;

    /// Upload a local file. Returns the number of bytes written.
    async fn upload_from(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<u64>;

    /// Remove an object. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Time-limited signed GET URL.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Verify the backing store is reachable.
    async fn check_connectivity(&self) -> StorageResult<()>;
}
