//! Per-kind processing pipelines.
//!
//! Every pipeline follows the same shape: stage the source object into the
//! job's scratch directory, run one external tool, publish the artifact
//! under a timestamped key, and report milestones along the way. The
//! executor owns status transitions and scratch cleanup.

pub mod aspect;
pub mod background;
pub mod compression;
pub mod conversion;
pub mod document;
pub mod filter;
pub mod speed;
pub mod subtitles;

use std::path::{Path, PathBuf};

use mflow_models::{keys, Job, JobParams};

use crate::context::ProcessingContext;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::scratch::ScratchDir;

/// Published artifact of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub output_key: String,
    pub output_url: String,
}

/// Route a job to its pipeline.
pub async fn run(
    ctx: &ProcessingContext,
    job: &Job,
    scratch: &ScratchDir,
    logger: &JobLogger,
) -> WorkerResult<PipelineOutput> {
    job.params.validate()?;

    match &job.params {
        JobParams::Filter(params) => filter::run(ctx, job, params, scratch, logger).await,
        JobParams::SpeedChange(params) => speed::run(ctx, job, params, scratch, logger).await,
        JobParams::Compression(params) => {
            compression::run(ctx, job, params, scratch, logger).await
        }
        JobParams::Conversion(params) => conversion::run(ctx, job, params, scratch, logger).await,
        JobParams::BackgroundRemoval(_) => background::run(ctx, job, scratch, logger).await,
        JobParams::DocumentOp(params) => document::run(ctx, job, params, scratch, logger).await,
        JobParams::AspectRatio(params) => aspect::run(ctx, job, params, scratch, logger).await,
        JobParams::Subtitles(params) => subtitles::run(ctx, job, params, scratch, logger).await,
    }
}

/// Millisecond timestamp embedded in output keys.
pub(crate) fn timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `input.<ext>` keeping the source extension so tools can sniff the format.
pub(crate) fn input_name(source_key: &str) -> String {
    indexed_input_name(None, source_key)
}

pub(crate) fn indexed_input_name(index: Option<usize>, source_key: &str) -> String {
    let ext = keys::extension(source_key).unwrap_or_else(|| "bin".to_string());
    match index {
        Some(i) => format!("input_{}.{}", i, ext),
        None => format!("input.{}", ext),
    }
}

/// Wait for the object to become visible, then download it.
///
/// An object that never shows up is still attempted once more by the
/// download itself, which reports `NotFound` if it is really absent.
pub(crate) async fn stage_source(
    ctx: &ProcessingContext,
    logger: &JobLogger,
    key: &str,
    dest: &Path,
) -> WorkerResult<PathBuf> {
    if !ctx.stage.wait_for_availability(key).await {
        logger.log_warning(&format!("{} not visible yet, attempting download anyway", key));
    }
    Ok(ctx
        .stage
        .download(key, dest, ctx.config.download_retries)
        .await?)
}

/// Upload the artifact and resolve the URL handed back to the owner.
pub(crate) async fn publish(
    ctx: &ProcessingContext,
    local: &Path,
    key: &str,
) -> WorkerResult<PipelineOutput> {
    let uploaded = ctx.stage.upload(key, local).await?;
    let output_url = ctx.access_url(&uploaded.key).await?;
    Ok(PipelineOutput {
        output_key: uploaded.key,
        output_url,
    })
}

/// Progress milestone: persisted and logged.
pub(crate) async fn milestone(
    ctx: &ProcessingContext,
    job: &Job,
    logger: &JobLogger,
    progress: u8,
    message: &str,
) -> WorkerResult<()> {
    logger.log_progress(progress, message);
    ctx.set_progress(&job.id, progress).await
}
