//! Shared data models for the mediaflow pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their status state machine
//! - Kind-specific job parameters
//! - Queue message wire format
//! - Object key layout

pub mod job;
pub mod keys;
pub mod message;
pub mod params;

pub use job::{Job, JobId, JobKind, JobStatus};
pub use message::QueueMessage;
pub use params::{
    AspectRatioParams, BackgroundRemovalParams, ColorAdjustments, CompressionParams,
    ConversionParams, DocumentOperation, DocumentParams, FilterParams, JobParams, MediaType,
    ParamsError, ParamsResult, SpeedParams, SubtitleCue, SubtitleParams,
};
