//! Object stage: staging remote objects to local disk and back.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::metrics;
use crate::retry::{retry_async_if, RetryConfig};
use crate::store::{ObjectMeta, ObjectStore};
use crate::url::CdnConfig;

/// Stage tuning knobs.
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Base delay of the linear download backoff.
    pub download_base_delay: Duration,
    /// Attempts made by the availability poll.
    pub availability_attempts: u32,
    /// First delay of the availability poll; doubles each attempt.
    pub availability_base_delay: Duration,
    /// Ceiling of the availability poll delay.
    pub availability_max_delay: Duration,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            download_base_delay: Duration::from_millis(1000),
            availability_attempts: 6,
            availability_base_delay: Duration::from_millis(500),
            availability_max_delay: Duration::from_secs(10),
        }
    }
}

impl StageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            download_base_delay: Duration::from_millis(
                std::env::var("STAGE_DOWNLOAD_BASE_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.download_base_delay.as_millis() as u64),
            ),
            availability_attempts: std::env::var("STAGE_AVAILABILITY_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.availability_attempts),
            availability_base_delay: Duration::from_millis(
                std::env::var("STAGE_AVAILABILITY_BASE_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.availability_base_delay.as_millis() as u64),
            ),
            availability_max_delay: defaults.availability_max_delay,
        }
    }
}

/// A published object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
}

/// Retrying facade over an [`ObjectStore`].
#[derive(Clone)]
pub struct ObjectStage {
    store: Arc<dyn ObjectStore>,
    config: StageConfig,
    cdn: CdnConfig,
}

impl ObjectStage {
    pub fn new(store: Arc<dyn ObjectStore>, config: StageConfig, cdn: CdnConfig) -> Self {
        Self { store, config, cdn }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.store.exists(key).await
    }

    pub async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>> {
        self.store.head(key).await
    }

    /// Download `key` to `local_path`, retrying transfer faults.
    ///
    /// An absent object fails immediately with [`StorageError::NotFound`];
    /// transfer faults are retried up to `attempts` times with linear backoff.
    pub async fn download(&self, key: &str, local_path: &Path, attempts: u32) -> StorageResult<PathBuf> {
        if !self.store.exists(key).await? {
            return Err(StorageError::not_found(key));
        }

        let config = RetryConfig::linear(
            format!("download {}", key),
            attempts,
            self.config.download_base_delay,
        );

        retry_async_if(
            &config,
            |attempt| async move {
                if attempt > 1 {
                    metrics::record_transfer_retry("download");
                }
                self.store.download_to(key, local_path).await?;
                verify_local(local_path).await
            },
            |e: &StorageError| !e.is_not_found() && !matches!(e, StorageError::ConfigError(_)),
        )
        .await?;

        Ok(local_path.to_path_buf())
    }

    /// Poll until `key` exists with a non-zero length.
    ///
    /// Backs off exponentially from the base delay up to the ceiling and
    /// returns `false` once attempts run out. Never errors.
    pub async fn wait_for_availability(&self, key: &str) -> bool {
        let config = RetryConfig::exponential(
            format!("availability {}", key),
            self.config.availability_attempts,
            self.config.availability_base_delay,
            self.config.availability_max_delay,
        );

        for attempt in 1..=config.max_attempts {
            match self.store.head(key).await {
                Ok(Some(meta)) if meta.size > 0 => {
                    debug!("{} available after {} check(s)", key, attempt);
                    metrics::record_availability(true);
                    return true;
                }
                Ok(Some(_)) => debug!("{} exists but is still empty (check {})", key, attempt),
                Ok(None) => debug!("{} not present yet (check {})", key, attempt),
                Err(e) => warn!("Availability check for {} failed: {}", key, e),
            }

            if attempt < config.max_attempts {
                tokio::time::sleep(config.delay_after(attempt)).await;
            }
        }

        warn!("{} not available after {} checks", key, config.max_attempts);
        metrics::record_availability(false);
        false
    }

    /// Upload a local file. The content type is guessed from the extension.
    pub async fn upload(&self, key: &str, local_path: &Path) -> StorageResult<RemoteObject> {
        let content_type = guess_content_type(local_path);
        let size = self.store.upload_from(local_path, key, &content_type).await?;
        info!("Published {} ({} bytes, {})", key, size, content_type);
        Ok(RemoteObject {
            key: key.to_string(),
            size,
        })
    }

    /// Remove a published object.
    pub async fn remove(&self, key: &str) -> StorageResult<()> {
        self.store.delete(key).await?;
        info!("Removed {}", key);
        Ok(())
    }

    /// Public CDN URL. No network access.
    pub fn cdn_url(&self, key: &str) -> StorageResult<String> {
        self.cdn.url_for(key)
    }

    /// Signed, time-limited URL. Fails if the object is absent.
    pub async fn signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        if !self.store.exists(key).await? {
            return Err(StorageError::not_found(key));
        }
        self.store.presign_get(key, ttl).await
    }

    /// CDN URL when a domain is configured, otherwise a signed URL.
    pub async fn access_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        match self.cdn_url(key) {
            Ok(url) => Ok(url),
            Err(StorageError::ConfigError(_)) => self.signed_url(key, ttl).await,
            Err(e) => Err(e),
        }
    }
}

async fn verify_local(path: &Path) -> StorageResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(StorageError::transfer(format!(
            "Downloaded file missing at {}",
            path.display()
        ))),
    }
}

/// Guess a MIME type from the file extension.
pub fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
