//! Per-attempt scratch directories.

use std::path::{Path, PathBuf};

use mflow_models::JobId;
use tempfile::TempDir;
use tracing::{debug, warn};

/// A directory that belongs to exactly one job attempt.
///
/// Call [`ScratchDir::cleanup`] on every exit path so removal errors are
/// logged; a plain drop still removes the directory.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create `<root>/<job_id>-<random>`, creating `root` if needed.
    pub async fn create(root: &Path, job_id: &JobId) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        let root = root.to_path_buf();
        let prefix = format!("{}-", job_id);
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(&root)
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!("Created scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a file inside this directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub async fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        match tokio::task::spawn_blocking(move || self.dir.close()).await {
            Ok(Ok(())) => debug!("Removed scratch directory {}", path.display()),
            Ok(Err(e)) => warn!("Failed to remove scratch directory {}: {}", path.display(), e),
            Err(e) => warn!("Scratch cleanup task for {} failed: {}", path.display(), e),
        }
    }
}
