//! Shared state handed to every pipeline.

use std::path::Path;
use std::sync::Arc;

use mflow_media::{
    parse_video_info, stream_info_command, PresetRegistry, ScriptRunner, ToolCommand, ToolOutput,
    VideoInfo,
};
use mflow_models::{Job, JobId, JobStatus};
use mflow_storage::ObjectStage;
use mflow_store::JobRepository;
use tracing::debug;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::notify::CompletionNotifier;

pub struct ProcessingContext {
    pub config: WorkerConfig,
    pub stage: ObjectStage,
    pub repo: Arc<dyn JobRepository>,
    pub presets: PresetRegistry,
    pub scripts: ScriptRunner,
    pub notifier: Arc<dyn CompletionNotifier>,
}

impl ProcessingContext {
    pub fn new(
        config: WorkerConfig,
        stage: ObjectStage,
        repo: Arc<dyn JobRepository>,
        presets: PresetRegistry,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> Self {
        let scripts = ScriptRunner::new(config.python_bin.clone(), config.scripts_dir.clone());
        Self {
            config,
            stage,
            repo,
            presets,
            scripts,
            notifier,
        }
    }

    /// Record a progress milestone while the job is still PROCESSING.
    ///
    /// A job that left PROCESSING in the meantime keeps its row untouched.
    pub async fn set_progress(&self, id: &JobId, progress: u8) -> WorkerResult<()> {
        let transition = self
            .repo
            .update_if(id, &[JobStatus::Processing], &|job: Job| job.with_progress(progress))
            .await?;
        if !transition.is_applied() {
            debug!(
                "Progress {} for job {} ignored, status is {}",
                progress,
                id,
                transition.job().status
            );
        }
        Ok(())
    }

    /// Run a prepared tool command under the per-tool timeout.
    pub async fn run_tool(&self, cmd: ToolCommand) -> WorkerResult<ToolOutput> {
        Ok(cmd.timeout(self.config.tool_timeout).execute().await?)
    }

    /// Dimensions, frame rate and duration of a local video.
    pub async fn video_info(&self, path: &Path) -> WorkerResult<VideoInfo> {
        let output = self
            .run_tool(stream_info_command(&self.config.ffprobe_bin, path))
            .await?;
        Ok(parse_video_info(&output.stdout)?)
    }

    /// CDN URL when configured, otherwise a signed URL.
    pub async fn access_url(&self, key: &str) -> WorkerResult<String> {
        Ok(self.stage.access_url(key, self.config.signed_url_ttl).await?)
    }
}
