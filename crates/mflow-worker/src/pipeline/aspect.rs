//! Reframing onto a new canvas shape.

use mflow_media::build_aspect_command;
use mflow_models::{keys, AspectRatioParams, Job};

use super::{input_name, milestone, publish, stage_source, timestamp, PipelineOutput};
use crate::context::ProcessingContext;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::scratch::ScratchDir;

pub async fn run(
    ctx: &ProcessingContext,
    job: &Job,
    params: &AspectRatioParams,
    scratch: &ScratchDir,
    logger: &JobLogger,
) -> WorkerResult<PipelineOutput> {
    params.validate()?;
    milestone(ctx, job, logger, 20, "parameters accepted").await?;

    let input = stage_source(ctx, logger, &job.source_key, &scratch.file(&input_name(&job.source_key))).await?;
    milestone(ctx, job, logger, 30, "source staged").await?;

    let info = ctx.video_info(&input).await?;
    let shape = format!("source is {}x{} at {:.2} fps", info.width, info.height, info.fps);
    milestone(ctx, job, logger, 35, &shape).await?;

    let output = scratch.file("reframed.mp4");
    let cmd = build_aspect_command(&input, &output, params, &info)?.into_tool(&ctx.config.ffmpeg_bin);
    milestone(ctx, job, logger, 40, "reframing").await?;
    ctx.run_tool(cmd).await?;
    milestone(ctx, job, logger, 80, "encode finished").await?;

    let key = keys::aspect_ratio_video(&job.user_id, timestamp(), &job.source_key);
    let published = publish(ctx, &output, &key).await?;
    milestone(ctx, job, logger, 90, "artifact uploaded").await?;
    Ok(published)
}
