//! Image background removal.

use mflow_models::{keys, Job};

use super::{input_name, milestone, publish, stage_source, timestamp, PipelineOutput};
use crate::context::ProcessingContext;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::scratch::ScratchDir;

pub async fn run(
    ctx: &ProcessingContext,
    job: &Job,
    scratch: &ScratchDir,
    logger: &JobLogger,
) -> WorkerResult<PipelineOutput> {
    let input = stage_source(ctx, logger, &job.source_key, &scratch.file(&input_name(&job.source_key))).await?;
    milestone(ctx, job, logger, 20, "source staged").await?;

    // Transparency needs an alpha channel, so the output is always PNG.
    let output = scratch.file("output.png");
    ctx.run_tool(ctx.scripts.remove_background(&input, &output)).await?;
    milestone(ctx, job, logger, 80, "background removed").await?;

    let key = keys::background_removed(&job.user_id, timestamp(), &job.source_key);
    let published = publish(ctx, &output, &key).await?;
    milestone(ctx, job, logger, 90, "artifact uploaded").await?;
    Ok(published)
}
