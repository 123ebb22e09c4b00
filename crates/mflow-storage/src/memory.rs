//! In-process object store used by tests and local runs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectMeta, ObjectStore};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// HashMap-backed [`ObjectStore`] with fault injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    download_calls: AtomicU32,
    failing_downloads: AtomicU32,
    failing_uploads: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object directly.
    pub async fn put(&self, key: &str, data: Vec<u8>) {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).map(|o| o.data.clone())
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.content_type.clone())
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Make the next `n` downloads fail with a transfer error.
    pub fn fail_next_downloads(&self, n: u32) {
        self.failing_downloads.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` uploads fail with a transfer error.
    pub fn fail_next_uploads(&self, n: u32) {
        self.failing_uploads.store(n, Ordering::SeqCst);
    }

    pub fn download_calls(&self) -> u32 {
        self.download_calls.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>> {
        Ok(self.objects.read().await.get(key).map(|o| ObjectMeta {
            key: key.to_string(),
            size: o.data.len() as u64,
        }))
    }

    async fn download_to(&self, key: &str, path: &Path) -> StorageResult<()> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_downloads) {
            return Err(StorageError::transfer(format!("injected download fault for {}", key)));
        }

        let data = self
            .get(key)
            .await
            .ok_or_else(|| StorageError::not_found(key))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn upload_from(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<u64> {
        if Self::take_failure(&self.failing_uploads) {
            return Err(StorageError::transfer(format!("injected upload fault for {}", key)));
        }

        let data = tokio::fs::read(path).await?;
        let size = data.len() as u64;
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(size)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        Ok(format!("memory://{}?expires={}", key, expires_in.as_secs()))
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        Ok(())
    }
}
