//! Playback speed change with matching audio tempo.

use mflow_media::build_speed_command;
use mflow_models::{keys, Job, SpeedParams};

use super::{input_name, milestone, publish, stage_source, timestamp, PipelineOutput};
use crate::context::ProcessingContext;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::scratch::ScratchDir;

pub async fn run(
    ctx: &ProcessingContext,
    job: &Job,
    params: &SpeedParams,
    scratch: &ScratchDir,
    logger: &JobLogger,
) -> WorkerResult<PipelineOutput> {
    params.validate()?;
    milestone(ctx, job, logger, 20, "parameters accepted").await?;

    let input = stage_source(ctx, logger, &job.source_key, &scratch.file(&input_name(&job.source_key))).await?;
    milestone(ctx, job, logger, 30, "source staged").await?;

    let output = scratch.file("speed.mp4");
    let cmd = build_speed_command(&input, &output, params).into_tool(&ctx.config.ffmpeg_bin);
    milestone(ctx, job, logger, 40, &format!("re-timing at {}x", params.speed)).await?;
    ctx.run_tool(cmd).await?;
    milestone(ctx, job, logger, 80, "encode finished").await?;

    let published = publish(ctx, &output, &keys::speed_video(&job.user_id, timestamp())).await?;
    milestone(ctx, job, logger, 90, "artifact uploaded").await?;
    Ok(published)
}
