//! Container and image format conversion.

use mflow_models::{keys, ConversionParams, Job};

use super::{input_name, milestone, publish, stage_source, timestamp, PipelineOutput};
use crate::context::ProcessingContext;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::scratch::ScratchDir;

pub async fn run(
    ctx: &ProcessingContext,
    job: &Job,
    params: &ConversionParams,
    scratch: &ScratchDir,
    logger: &JobLogger,
) -> WorkerResult<PipelineOutput> {
    let input = stage_source(ctx, logger, &job.source_key, &scratch.file(&input_name(&job.source_key))).await?;
    milestone(ctx, job, logger, 20, "source staged").await?;

    let extension = params.extension();
    let output = scratch.file(&format!("converted.{}", extension));
    ctx.run_tool(ctx.scripts.convert(&input, &output, params)).await?;
    milestone(
        ctx,
        job,
        logger,
        80,
        &format!("converted {} to {}", params.media_type.as_str(), params.normalized_format()),
    )
    .await?;

    let key = keys::converted(&job.user_id, timestamp(), &job.source_key, &extension);
    let published = publish(ctx, &output, &key).await?;
    milestone(ctx, job, logger, 90, "artifact uploaded").await?;
    Ok(published)
}
