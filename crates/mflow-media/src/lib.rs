//! External tool layer for the mediaflow pipeline.
//!
//! This crate provides:
//! - A subprocess invoker with concurrent stream draining and output verification
//! - FFmpeg argument builders for color filters, speed changes, reframing
//!   and subtitle burn-in
//! - Stream metadata parsing
//! - Named color presets
//! - Argument builders for the Python helper scripts

pub mod aspect;
pub mod command;
pub mod error;
pub mod filters;
pub mod inspect;
pub mod invoker;
pub mod metrics;
pub mod presets;
pub mod scripts;
pub mod speed;
pub mod subtitles;

pub use aspect::build_aspect_command;
pub use command::Transcode;
pub use error::{MediaError, MediaResult};
pub use filters::{build_filter_chain, build_filter_command, resolve_adjustments};
pub use inspect::{parse_video_info, stream_info_command, VideoInfo};
pub use invoker::{ensure_available, ToolCommand, ToolOutput};
pub use presets::PresetRegistry;
pub use scripts::ScriptRunner;
pub use speed::{build_speed_command, Quality};
pub use subtitles::{build_subtitle_command, render_srt};
