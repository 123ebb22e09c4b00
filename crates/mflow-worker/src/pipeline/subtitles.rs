//! Subtitle burn-in from cues carried on the job.

use mflow_media::{build_subtitle_command, render_srt};
use mflow_models::{keys, Job, SubtitleParams};

use super::{input_name, milestone, publish, stage_source, timestamp, PipelineOutput};
use crate::context::ProcessingContext;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::scratch::ScratchDir;

const CUES_FILE: &str = "cues.srt";

pub async fn run(
    ctx: &ProcessingContext,
    job: &Job,
    params: &SubtitleParams,
    scratch: &ScratchDir,
    logger: &JobLogger,
) -> WorkerResult<PipelineOutput> {
    params.validate()?;
    milestone(ctx, job, logger, 20, "parameters accepted").await?;

    let input = stage_source(ctx, logger, &job.source_key, &scratch.file(&input_name(&job.source_key))).await?;
    tokio::fs::write(scratch.file(CUES_FILE), render_srt(&params.cues)).await?;
    milestone(ctx, job, logger, 30, &format!("source staged, {} cue(s) written", params.cues.len())).await?;

    let output = scratch.file("subtitled.mp4");
    let cmd = build_subtitle_command(&input, &output, CUES_FILE, params)
        .into_tool(&ctx.config.ffmpeg_bin)
        .working_dir(scratch.path());
    milestone(ctx, job, logger, 40, "burning subtitles").await?;
    ctx.run_tool(cmd).await?;
    milestone(ctx, job, logger, 80, "encode finished").await?;

    let key = keys::subtitled_video(&job.user_id, timestamp(), &job.source_key);
    let published = publish(ctx, &output, &key).await?;
    milestone(ctx, job, logger, 90, "artifact uploaded").await?;
    Ok(published)
}
