//! Access URL generation.

use crate::error::{StorageError, StorageResult};

/// Public CDN configuration.
#[derive(Debug, Clone, Default)]
pub struct CdnConfig {
    /// Public domain serving the bucket, with or without scheme.
    pub domain: Option<String>,
}

impl CdnConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            domain: std::env::var("CDN_DOMAIN")
                .ok()
                .filter(|d| !d.trim().is_empty()),
        }
    }

    /// Stable public URL for a key. Pure templating, no network access.
    pub fn url_for(&self, key: &str) -> StorageResult<String> {
        let domain = self
            .domain
            .as_deref()
            .ok_or_else(|| StorageError::config_error("CDN_DOMAIN not set"))?;
        Ok(cdn_url(domain, key))
    }
}

/// `https://<domain>/<key>`, tolerating a scheme or trailing slash on the domain.
pub fn cdn_url(domain: &str, key: &str) -> String {
    let host = domain
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!("https://{}/{}", host, key.trim_start_matches('/'))
}
