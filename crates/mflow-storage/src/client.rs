//! R2 client implementation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::metrics;
use crate::store::{ObjectMeta, ObjectStore, CACHE_CONTROL};

/// Files at or above this size go through multipart upload (200 MiB).
pub const LARGE_FILE_THRESHOLD: u64 = 200 * 1024 * 1024;

/// Size of each multipart chunk (16 MiB).
pub const MULTIPART_PART_SIZE: u64 = 16 * 1024 * 1024;

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: required_env("R2_ENDPOINT_URL")?,
            access_key_id: required_env("R2_ACCESS_KEY_ID")?,
            secret_access_key: required_env("R2_SECRET_ACCESS_KEY")?,
            bucket_name: required_env("R2_BUCKET_NAME")?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

fn required_env(name: &str) -> StorageResult<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(StorageError::config_error(format!("{} not set", name))),
    }
}

/// Cloudflare R2 (S3-compatible) storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(R2Config::from_env()?))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_single(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::transfer(format!("Failed to read {}: {}", path.display(), e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .cache_control(CACHE_CONTROL)
            .send()
            .await
            .map_err(|e| StorageError::transfer(format!("put {}: {}", key, DisplayErrorContext(&e))))?;

        Ok(())
    }

    async fn put_multipart(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
        size: u64,
    ) -> StorageResult<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .cache_control(CACHE_CONTROL)
            .send()
            .await
            .map_err(|e| {
                StorageError::transfer(format!("create multipart {}: {}", key, DisplayErrorContext(&e)))
            })?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::transfer(format!("No upload id returned for {}", key)))?
            .to_string();

        let parts = match self.upload_parts(path, key, &upload_id, size).await {
            Ok(parts) => parts,
            Err(e) => {
                self.abort_multipart(key, &upload_id).await;
                return Err(e);
            }
        };

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        if let Err(e) = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(completed)
            .send()
            .await
        {
            self.abort_multipart(key, &upload_id).await;
            return Err(StorageError::transfer(format!(
                "complete multipart {}: {}",
                key,
                DisplayErrorContext(&e)
            )));
        }

        Ok(())
    }

    async fn upload_parts(
        &self,
        path: &Path,
        key: &str,
        upload_id: &str,
        size: u64,
    ) -> StorageResult<Vec<CompletedPart>> {
        let part_count = size.div_ceil(MULTIPART_PART_SIZE);
        let mut parts = Vec::with_capacity(part_count as usize);

        for index in 0..part_count {
            let offset = index * MULTIPART_PART_SIZE;
            let length = MULTIPART_PART_SIZE.min(size - offset);
            let part_number = (index + 1) as i32;

            let body = ByteStream::read_from()
                .path(path)
                .offset(offset)
                .length(Length::Exact(length))
                .build()
                .await
                .map_err(|e| StorageError::transfer(format!("Failed to read part {}: {}", part_number, e)))?;

            let output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(|e| {
                    StorageError::transfer(format!(
                        "upload part {} of {}: {}",
                        part_number,
                        key,
                        DisplayErrorContext(&e)
                    ))
                })?;

            debug!("Uploaded part {}/{} of {}", part_number, part_count, key);

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
        }

        Ok(parts)
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!("Failed to abort multipart upload of {}: {}", key, DisplayErrorContext(&e));
        }
    }
}

#[async_trait]
impl ObjectStore for R2Client {
    fn name(&self) -> &'static str {
        "r2"
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: output.content_length().unwrap_or(0).max(0) as u64,
            })),
            Err(e) => match e.as_service_error() {
                Some(se) if se.is_not_found() => Ok(None),
                _ => Err(StorageError::transfer(format!(
                    "head {}: {}",
                    key,
                    DisplayErrorContext(&e)
                ))),
            },
        }
    }

    async fn download_to(&self, key: &str, path: &Path) -> StorageResult<()> {
        debug!("Downloading {} to {}", key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_no_such_key() => StorageError::not_found(key),
                _ => StorageError::transfer(format!("get {}: {}", key, DisplayErrorContext(&e))),
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut reader = response.body.into_async_read();
        let mut file = tokio::fs::File::create(path).await?;
        let streamed = match tokio::io::copy(&mut reader, &mut file).await {
            Ok(_) => file.flush().await,
            Err(e) => Err(e),
        };

        match streamed {
            Ok(()) => {
                info!("Downloaded {} to {}", key, path.display());
                Ok(())
            }
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(path).await;
                Err(StorageError::transfer(format!("Failed to stream {}: {}", key, e)))
            }
        }
    }

    async fn upload_from(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<u64> {
        let size = tokio::fs::metadata(path).await?.len();

        if size >= LARGE_FILE_THRESHOLD {
            debug!("Uploading {} ({} bytes) to {} via multipart", path.display(), size, key);
            self.put_multipart(path, key, content_type, size).await?;
            metrics::record_upload("multipart", size);
        } else {
            debug!("Uploading {} ({} bytes) to {}", path.display(), size, key);
            self.put_single(path, key, content_type).await?;
            metrics::record_upload("single", size);
        }

        info!("Uploaded {} to {}", path.display(), key);
        Ok(size)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!("Deleting {}", key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::transfer(format!("delete {}: {}", key, DisplayErrorContext(&e))))?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::config_error(format!("Invalid presign expiry: {}", e)))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::transfer(format!("presign {}: {}", key, DisplayErrorContext(&e))))?;

        Ok(presigned.uri().to_string())
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::transfer(format!("R2 connectivity check failed: {}", DisplayErrorContext(&e)))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_and_part_size() {
        assert_eq!(LARGE_FILE_THRESHOLD, 209_715_200);
        // S3 rejects parts below 5 MiB except the last one.
        assert!(MULTIPART_PART_SIZE >= 5 * 1024 * 1024);
        assert_eq!((LARGE_FILE_THRESHOLD + 1).div_ceil(MULTIPART_PART_SIZE), 13);
    }

    #[test]
    fn test_new_client_keeps_bucket() {
        let client = R2Client::new(R2Config {
            endpoint_url: "https://example.r2.cloudflarestorage.com".to_string(),
            access_key_id: "key".to_string(),
            secret_access_key: "secret".to_string(),
            bucket_name: "media".to_string(),
            region: "auto".to_string(),
        });
        assert_eq!(client.bucket(), "media");
        assert_eq!(client.name(), "r2");
    }
}
