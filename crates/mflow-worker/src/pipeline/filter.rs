//! Color grading through an ffmpeg filter chain.

use mflow_media::build_filter_command;
use mflow_models::{keys, FilterParams, Job};

use super::{input_name, milestone, publish, stage_source, timestamp, PipelineOutput};
use crate::context::ProcessingContext;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::scratch::ScratchDir;

pub async fn run(
    ctx: &ProcessingContext,
    job: &Job,
    params: &FilterParams,
    scratch: &ScratchDir,
    logger: &JobLogger,
) -> WorkerResult<PipelineOutput> {
    let ts = timestamp();
    let input = stage_source(ctx, logger, &job.source_key, &scratch.file(&input_name(&job.source_key))).await?;
    milestone(ctx, job, logger, 10, "source staged").await?;

    // A LUT that cannot be fetched degrades to the plain adjustment chain.
    let mut lut = None;
    if let Some(lut_key) = params.lut_key.as_deref().filter(|k| !k.is_empty()) {
        let dest = scratch.file(&keys::lut_file_name(ts));
        match ctx.stage.download(lut_key, &dest, ctx.config.download_retries).await {
            Ok(path) => lut = Some(path),
            Err(e) => logger.log_warning(&format!("LUT {} unavailable, continuing without it: {}", lut_key, e)),
        }
    }
    milestone(ctx, job, logger, 20, "filter chain prepared").await?;

    let output = scratch.file("filtered.mp4");
    let cmd = build_filter_command(&input, &output, params, &ctx.presets, lut.as_deref())
        .into_tool(&ctx.config.ffmpeg_bin);
    ctx.run_tool(cmd).await?;
    milestone(ctx, job, logger, 80, "encode finished").await?;

    let published = publish(ctx, &output, &keys::filtered_video(&job.user_id, ts)).await?;
    milestone(ctx, job, logger, 90, "artifact uploaded").await?;
    Ok(published)
}
