//! Media job worker.
//!
//! This crate provides:
//! - Poll loops that consume job messages and enforce the status guards
//! - Per-kind pipelines (filter, speed, compression, conversion,
//!   background removal, document operations)
//! - Per-attempt scratch directories and progress milestones
//! - Completion notifications
//! - Graceful shutdown

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod scratch;

pub use config::WorkerConfig;
pub use context::ProcessingContext;
pub use error::{WorkerError, WorkerResult};
pub use executor::{handle_message, process_job, JobExecutor, MessageOutcome};
pub use logging::JobLogger;
pub use notify::{CompletionEvent, CompletionNotifier, LogNotifier, WebhookNotifier};
pub use pipeline::PipelineOutput;
pub use scratch::ScratchDir;
