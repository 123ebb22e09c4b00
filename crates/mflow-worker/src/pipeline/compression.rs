//! Size-targeted compression via the compression script.

use mflow_models::{keys, CompressionParams, Job};

use super::{input_name, milestone, publish, stage_source, timestamp, PipelineOutput};
use crate::context::ProcessingContext;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::scratch::ScratchDir;

pub async fn run(
    ctx: &ProcessingContext,
    job: &Job,
    params: &CompressionParams,
    scratch: &ScratchDir,
    logger: &JobLogger,
) -> WorkerResult<PipelineOutput> {
    let input_file = input_name(&job.source_key);
    let input = stage_source(ctx, logger, &job.source_key, &scratch.file(&input_file)).await?;
    milestone(ctx, job, logger, 20, "source staged").await?;

    // Same extension as the source; the script keeps the container.
    let output = scratch.file(&input_file.replacen("input", "compressed", 1));
    ctx.run_tool(ctx.scripts.compress(&input, &output, params)).await?;
    milestone(ctx, job, logger, 80, &format!("compressed to {}", params.target_size)).await?;

    let key = keys::compressed(&job.user_id, timestamp(), &job.source_key);
    let published = publish(ctx, &output, &key).await?;
    milestone(ctx, job, logger, 90, "artifact uploaded").await?;
    Ok(published)
}
