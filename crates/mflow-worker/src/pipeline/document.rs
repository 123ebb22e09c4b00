//! PDF and image document operations.

use mflow_models::{keys, DocumentOperation, DocumentParams, Job};

use super::{indexed_input_name, milestone, publish, stage_source, timestamp, PipelineOutput};
use crate::context::ProcessingContext;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::scratch::ScratchDir;

pub async fn run(
    ctx: &ProcessingContext,
    job: &Job,
    params: &DocumentParams,
    scratch: &ScratchDir,
    logger: &JobLogger,
) -> WorkerResult<PipelineOutput> {
    let sources: Vec<&str> = std::iter::once(job.source_key.as_str())
        .chain(params.extra_source_keys.iter().map(String::as_str))
        .collect();

    let mut inputs = Vec::with_capacity(sources.len());
    for (i, key) in sources.iter().enumerate() {
        let dest = scratch.file(&indexed_input_name(Some(i), key));
        inputs.push(stage_source(ctx, logger, key, &dest).await?);
    }
    milestone(ctx, job, logger, 20, &format!("{} input(s) staged", inputs.len())).await?;

    let ts = timestamp();
    let file = output_file_name(params.operation, &job.source_key, ts);
    let output = scratch.file(&file);
    let cmd = ctx.scripts.document(&inputs, &output, params)?;
    ctx.run_tool(cmd).await?;
    milestone(ctx, job, logger, 80, &format!("{} finished", params.operation.as_str())).await?;

    let published = publish(ctx, &output, &keys::document_output(&job.user_id, ts, &file)).await?;
    milestone(ctx, job, logger, 90, "artifact uploaded").await?;
    Ok(published)
}

/// Artifact file name for an operation, derived from the first source.
pub fn output_file_name(operation: DocumentOperation, source_key: &str, ts: i64) -> String {
    let base = keys::sanitize_component(keys::file_stem(source_key));
    match operation {
        DocumentOperation::ImagesToPdf => format!("{}_{}.pdf", base, ts),
        DocumentOperation::MergePdf => format!("merged_{}.pdf", ts),
        DocumentOperation::SplitPdf => format!("split_{}.zip", ts),
        DocumentOperation::CompressPdf => format!("{}_compressed_{}.pdf", base, ts),
        DocumentOperation::RotatePdf => format!("{}_rotated_{}.pdf", base, ts),
        DocumentOperation::PdfToImages => format!("{}_images_{}.zip", base, ts),
        DocumentOperation::AddWatermark => format!("{}_watermarked_{}.pdf", base, ts),
        DocumentOperation::UnlockPdf => format!("{}_unlocked_{}.pdf", base, ts),
        DocumentOperation::LockPdf => format!("{}_locked_{}.pdf", base, ts),
        _ => format!("output_{}.{}", ts, operation.output_extension()),
    }
}
