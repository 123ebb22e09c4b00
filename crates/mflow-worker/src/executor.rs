//! Job executor.
//!
//! Each poll loop receives at most one message per cycle, runs it to the
//! end, and only then polls again. Shutdown interrupts the receive and the
//! idle sleep, never a running job.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mflow_models::{Job, JobId, JobKind, JobStatus, QueueMessage};
use mflow_queue::{MessageQueue, ReceivedMessage};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::context::ProcessingContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::notify::notify_in_background;
use crate::pipeline;
use crate::scratch::ScratchDir;

/// What happened to a received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Job finished SUCCESS; message deleted.
    Completed(JobId),
    /// Job finished FAILED; message left for redelivery.
    Failed(JobId),
    /// Delivery count over the ceiling and no live attempt; message deleted.
    Poison,
    /// Job is no longer PROCESSING, or left it while this attempt ran;
    /// message deleted.
    Stale(JobId),
    /// Another consumer holds the job lease; message left alone.
    Busy(JobId),
    /// Message cannot be acted on; deleted.
    Discarded(&'static str),
}

/// Job executor that runs poll loops against a message queue.
pub struct JobExecutor {
    ctx: Arc<ProcessingContext>,
    queue: Arc<dyn MessageQueue>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(ctx: Arc<ProcessingContext>, queue: Arc<dyn MessageQueue>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            ctx,
            queue,
            shutdown,
            consumer_name: format!("worker-{}", Uuid::new_v4().simple()),
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Run `config.loops` poll loops until shutdown.
    pub async fn run(&self) -> WorkerResult<()> {
        let loops = self.ctx.config.loops.max(1);
        info!(
            "Starting job executor '{}' with {} poll loop(s)",
            self.consumer_name, loops
        );
        tokio::fs::create_dir_all(&self.ctx.config.work_dir).await?;

        let mut set = JoinSet::new();
        for i in 0..loops {
            let ctx = Arc::clone(&self.ctx);
            let queue = Arc::clone(&self.queue);
            let consumer = format!("{}-{}", self.consumer_name, i);
            let shutdown = self.shutdown.subscribe();
            set.spawn(poll_loop(ctx, queue, consumer, shutdown));
        }

        let mut shutdown_rx = self.shutdown.subscribe();
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown_rx) => {
                info!("Shutdown signal received, waiting for in-flight jobs...");
            }
            _ = drain(&mut set) => {
                return Ok(());
            }
        }

        let limit = self.ctx.config.shutdown_timeout;
        if tokio::time::timeout(limit, drain(&mut set)).await.is_err() {
            warn!(
                "In-flight jobs did not finish within {:?}; they stay PROCESSING for redelivery",
                limit
            );
            set.abort_all();
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Receive and handle a single message, if one arrives within the wait.
    pub async fn poll_once(&self) -> WorkerResult<Option<MessageOutcome>> {
        let Some(message) = self
            .queue
            .receive(&self.consumer_name, self.ctx.config.receive_wait)
            .await?
        else {
            return Ok(None);
        };
        handle_message(&self.ctx, self.queue.as_ref(), &self.consumer_name, message)
            .await
            .map(Some)
    }
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn drain(set: &mut JoinSet<()>) {
    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                error!("Poll loop panicked: {}", e);
            }
        }
    }
}

async fn poll_loop(
    ctx: Arc<ProcessingContext>,
    queue: Arc<dyn MessageQueue>,
    consumer: String,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Poll loop {} started", consumer);
    let wait = ctx.config.receive_wait;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let received = tokio::select! {
            _ = shutdown.changed() => break,
            received = queue.receive(&consumer, wait) => received,
        };

        match received {
            Ok(Some(message)) => {
                let message_id = message.id.clone();
                match handle_message(&ctx, queue.as_ref(), &consumer, message).await {
                    Ok(outcome) => debug!("Message {} handled: {:?}", message_id, outcome),
                    Err(e) => error!("Failed to handle message {}: {}", message_id, e),
                }
            }
            Ok(None) => {}
            Err(e) => error!("Failed to receive from queue: {}", e),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(ctx.config.poll_interval) => {}
        }
    }

    debug!("Poll loop {} stopped", consumer);
}

/// Validate a delivery and run the job it references.
///
/// Job failures are recorded on the row and reported as
/// [`MessageOutcome::Failed`]; `Err` is reserved for queue or store faults.
/// While the job runs the message's visibility timeout is restarted every
/// `heartbeat_interval`, so a long attempt is not redelivered to a peer.
pub async fn handle_message(
    ctx: &ProcessingContext,
    queue: &dyn MessageQueue,
    consumer: &str,
    message: ReceivedMessage,
) -> WorkerResult<MessageOutcome> {
    if message.delivery_count > queue.max_retries() {
        return handle_over_ceiling(ctx, queue, consumer, &message).await;
    }

    let decoded = match message.decode() {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Discarding malformed message {}: {}", message.id, e);
            return discard(queue, &message, "malformed").await;
        }
    };

    let Some(kind) = decoded.kind() else {
        warn!(
            "Discarding message {} with task type {:?}",
            message.id, decoded.task_type
        );
        return discard(queue, &message, "unknown_task_type").await;
    };

    let Some(job) = ctx.repo.get(&decoded.job_id).await? else {
        warn!("Discarding message {}: job {} does not exist", message.id, decoded.job_id);
        return discard(queue, &message, "missing_job").await;
    };

    if job.kind() != kind {
        warn!(
            "Discarding message {}: task type {} does not match job {} of kind {}",
            message.id,
            kind.task_type(),
            job.id,
            job.kind()
        );
        return discard(queue, &message, "kind_mismatch").await;
    }

    if job.status != JobStatus::Processing {
        info!(
            job_id = %job.id,
            status = %job.status,
            "Stale message {}, deleting", message.id
        );
        metrics::record_stale();
        queue.delete(&message.id).await?;
        return Ok(MessageOutcome::Stale(job.id));
    }

    if !ctx.repo.try_lease(&job.id, consumer, ctx.config.lease_ttl).await? {
        info!(job_id = %job.id, "Job is leased by another consumer, leaving message {}", message.id);
        return Ok(MessageOutcome::Busy(job.id));
    }

    let job_id = job.id.clone();
    let result = with_heartbeat(
        queue,
        consumer,
        &message.id,
        ctx.config.heartbeat_interval,
        process_job(ctx, job),
    )
    .await;

    if let Err(e) = ctx.repo.release_lease(&job_id, consumer).await {
        warn!(job_id = %job_id, "Failed to release lease: {}", e);
    }

    match result {
        Ok(()) => {
            queue.delete(&message.id).await?;
            Ok(MessageOutcome::Completed(job_id))
        }
        Err(WorkerError::Superseded(status)) => {
            info!(job_id = %job_id, status = %status, "Result superseded, deleting message {}", message.id);
            metrics::record_stale();
            queue.delete(&message.id).await?;
            Ok(MessageOutcome::Stale(job_id))
        }
        Err(e) => {
            debug!(
                job_id = %job_id,
                retryable = e.is_retryable(),
                "Leaving message {} for redelivery", message.id
            );
            Ok(MessageOutcome::Failed(job_id))
        }
    }
}

/// Restart the visibility timeout of `message_id` every `period` until
/// `work` finishes. A zero period disables the heartbeat.
async fn with_heartbeat<F: Future>(
    queue: &dyn MessageQueue,
    consumer: &str,
    message_id: &str,
    period: Duration,
    work: F,
) -> F::Output {
    if period.is_zero() {
        return work.await;
    }

    tokio::pin!(work);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            output = &mut work => return output,
            _ = ticker.tick() => {
                if let Err(e) = queue.extend_visibility(consumer, message_id).await {
                    warn!("Heartbeat for message {} failed: {}", message_id, e);
                }
            }
        }
    }
}

/// A message past its delivery ceiling is dropped only when no consumer
/// still holds the job lease. A held lease means an attempt is running.
async fn handle_over_ceiling(
    ctx: &ProcessingContext,
    queue: &dyn MessageQueue,
    consumer: &str,
    message: &ReceivedMessage,
) -> WorkerResult<MessageOutcome> {
    let decoded = match message.decode() {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Dropping undecodable message {} past its delivery ceiling: {}", message.id, e);
            return drop_poison(queue, message).await;
        }
    };

    if !ctx.repo.try_lease(&decoded.job_id, consumer, ctx.config.lease_ttl).await? {
        info!(
            job_id = %decoded.job_id,
            "Message {} is past its delivery ceiling but the job is still leased, leaving it",
            message.id
        );
        return Ok(MessageOutcome::Busy(decoded.job_id));
    }

    warn!(
        job_id = %decoded.job_id,
        "Message {} delivered {} times (max {}), dropping",
        message.id,
        message.delivery_count,
        queue.max_retries()
    );
    fail_orphaned(ctx, &decoded).await;

    if let Err(e) = ctx.repo.release_lease(&decoded.job_id, consumer).await {
        warn!(job_id = %decoded.job_id, "Failed to release lease: {}", e);
    }
    drop_poison(queue, message).await
}

async fn drop_poison(queue: &dyn MessageQueue, message: &ReceivedMessage) -> WorkerResult<MessageOutcome> {
    metrics::record_poison();
    queue.delete(&message.id).await?;
    Ok(MessageOutcome::Poison)
}

/// Mark a job whose message is being dropped as FAILED, if it is still open.
async fn fail_orphaned(ctx: &ProcessingContext, decoded: &QueueMessage) {
    let open = [JobStatus::Pending, JobStatus::Processing];
    match ctx
        .repo
        .update_if(&decoded.job_id, &open, &|job: Job| job.fail("Exceeded max retries"))
        .await
    {
        Ok(transition) if transition.is_applied() => {
            let job = transition.into_job();
            warn!(job_id = %job.id, "Job failed after exceeding max retries");
            metrics::record_job_failed(job.kind(), std::time::Duration::ZERO);
            notify_in_background(Arc::clone(&ctx.notifier), &job);
        }
        Ok(_) => {}
        Err(e) if e.is_not_found() => {}
        Err(e) => warn!(job_id = %decoded.job_id, "Failed to mark poisoned job as failed: {}", e),
    }
}

async fn discard(
    queue: &dyn MessageQueue,
    message: &ReceivedMessage,
    reason: &'static str,
) -> WorkerResult<MessageOutcome> {
    metrics::record_discarded(reason);
    queue.delete(&message.id).await?;
    Ok(MessageOutcome::Discarded(reason))
}

/// Run one attempt of a PROCESSING job and record the terminal status.
pub async fn process_job(ctx: &ProcessingContext, job: Job) -> WorkerResult<()> {
    let logger = JobLogger::new(&job.id, job.kind());
    let span = logger.span();
    run_attempt(ctx, job, logger).instrument(span).await
}

async fn run_attempt(ctx: &ProcessingContext, job: Job, logger: JobLogger) -> WorkerResult<()> {
    let kind = job.kind();
    let started = Instant::now();
    logger.log_start(&format!("source {}", job.source_key));
    metrics::record_job_started(kind);

    let result = match ScratchDir::create(&ctx.config.work_dir, &job.id).await {
        Ok(scratch) => {
            let limit = ctx.config.job_timeout;
            let pipeline = pipeline::run(ctx, &job, &scratch, &logger);
            let result = match tokio::time::timeout(limit, pipeline).await {
                Ok(result) => result,
                Err(_) => Err(WorkerError::Timeout(limit)),
            };
            scratch.cleanup().await;
            result
        }
        Err(e) => Err(WorkerError::from(e)),
    };

    match result {
        Ok(output) => {
            let transition = ctx
                .repo
                .update_if(&job.id, &[JobStatus::Processing], &|j: Job| {
                    j.complete(output.output_key.clone(), output.output_url.clone())
                })
                .await?;
            if !transition.is_applied() {
                let status = transition.job().status;
                logger.log_warning(&format!("finished but status moved to {}, result dropped", status));
                if let Err(e) = ctx.stage.remove(&output.output_key).await {
                    warn!(job_id = %job.id, "Failed to remove superseded output {}: {}", output.output_key, e);
                }
                return Err(WorkerError::Superseded(status));
            }
            logger.log_completion(&output.output_key);
            metrics::record_job_completed(kind, started.elapsed());
            notify_in_background(Arc::clone(&ctx.notifier), transition.job());
            Ok(())
        }
        Err(e) => {
            let diagnostic = e.diagnostic();
            logger.log_error(&diagnostic);
            metrics::record_job_failed(kind, started.elapsed());
            record_failure(ctx, &job.id, kind, &diagnostic).await;
            Err(e)
        }
    }
}

async fn record_failure(ctx: &ProcessingContext, id: &JobId, kind: JobKind, diagnostic: &str) {
    match ctx
        .repo
        .update_if(id, &[JobStatus::Processing], &|j: Job| j.fail(diagnostic))
        .await
    {
        Ok(transition) if transition.is_applied() => {
            notify_in_background(Arc::clone(&ctx.notifier), transition.job());
        }
        Ok(transition) => debug!(
            job_id = %id,
            kind = %kind,
            "Failure not recorded, status is {}",
            transition.job().status
        ),
        Err(e) => error!(job_id = %id, "Failed to record job failure: {}", e),
    }
}
