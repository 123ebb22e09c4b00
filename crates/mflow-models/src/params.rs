//! Kind-specific job parameters.
//!
//! Every job kind carries its own strongly-typed parameter struct. Queue
//! messages carry a flattened copy produced by [`JobParams::to_wire`] for
//! consumers that read fields next to `taskType`; workers always load the
//! typed parameters from the job row.

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::job::JobKind;

/// Lowest accepted playback speed multiplier.
pub const MIN_SPEED: f64 = 0.5;
/// Highest accepted playback speed multiplier.
pub const MAX_SPEED: f64 = 15.0;

/// Container formats accepted for video conversion.
pub const VIDEO_FORMATS: [&str; 7] = ["MP4", "AVI", "MKV", "MOV", "WEBM", "FLV", "WMV"];
/// Formats accepted for image conversion.
pub const IMAGE_FORMATS: [&str; 6] = ["PNG", "JPG", "BMP", "GIF", "TIFF", "WEBP"];

/// Accepted subtitle font sizes, in points.
pub const FONT_SIZE_RANGE: std::ops::RangeInclusive<u32> = 8..=200;

static TARGET_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(KB|MB)$").expect("valid target size pattern"));

pub type ParamsResult<T> = Result<T, ParamsError>;

/// Parameter validation errors.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Speed must be between 0.5 and 15.0, got {0}")]
    SpeedOutOfRange(f64),

    #[error("Invalid target size '{0}', expected e.g. 500KB or 5MB")]
    InvalidTargetSize(String),

    #[error("Unsupported {media_type} format '{format}'")]
    UnsupportedFormat { media_type: &'static str, format: String },

    #[error("{operation} requires at least {min} source document(s)")]
    MissingSources { operation: &'static str, min: usize },

    #[error("Invalid aspect ratio '{0}', expected W:H with positive integers")]
    InvalidAspectRatio(String),

    #[error("An aspect ratio or both output dimensions are required")]
    MissingCanvas,

    #[error("{0} must be positive")]
    NonPositiveDimension(&'static str),

    #[error("Scale must be a positive number, got {0}")]
    InvalidScale(f64),

    #[error("At least one subtitle cue is required")]
    NoSubtitleCues,

    #[error("Subtitle cue {index}: {reason}")]
    InvalidCue { index: usize, reason: &'static str },

    #[error("Font size must be between 8 and 200, got {0}")]
    FontSizeOutOfRange(u32),
}

/// Tagged union over all job kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobParams {
    Filter(FilterParams),
    SpeedChange(SpeedParams),
    Compression(CompressionParams),
    Conversion(ConversionParams),
    BackgroundRemoval(BackgroundRemovalParams),
    DocumentOp(DocumentParams),
    AspectRatio(AspectRatioParams),
    Subtitles(SubtitleParams),
}

impl JobParams {
    pub fn kind(&self) -> JobKind {
        match self {
            JobParams::Filter(_) => JobKind::Filter,
            JobParams::SpeedChange(_) => JobKind::SpeedChange,
            JobParams::Compression(_) => JobKind::Compression,
            JobParams::Conversion(_) => JobKind::Conversion,
            JobParams::BackgroundRemoval(_) => JobKind::BackgroundRemoval,
            JobParams::DocumentOp(_) => JobKind::DocumentOp,
            JobParams::AspectRatio(_) => JobKind::AspectRatio,
            JobParams::Subtitles(_) => JobKind::Subtitles,
        }
    }

    /// Validate kind-specific constraints.
    pub fn validate(&self) -> ParamsResult<()> {
        match self {
            JobParams::Filter(_) | JobParams::BackgroundRemoval(_) => Ok(()),
            JobParams::SpeedChange(p) => p.validate(),
            JobParams::Compression(p) => p.validate(),
            JobParams::Conversion(p) => p.validate(),
            JobParams::DocumentOp(p) => p.validate(),
            JobParams::AspectRatio(p) => p.validate(),
            JobParams::Subtitles(p) => p.validate(),
        }
    }

    /// Flatten into the camelCase field map carried next to `taskType`.
    pub fn to_wire(&self) -> Map<String, Value> {
        let value = match self {
            JobParams::Filter(p) => serde_json::to_value(p),
            JobParams::SpeedChange(p) => serde_json::to_value(p),
            JobParams::Compression(p) => serde_json::to_value(p),
            JobParams::Conversion(p) => serde_json::to_value(p),
            JobParams::BackgroundRemoval(p) => serde_json::to_value(p),
            JobParams::DocumentOp(p) => serde_json::to_value(p),
            JobParams::AspectRatio(p) => serde_json::to_value(p),
            JobParams::Subtitles(p) => serde_json::to_value(p),
        };
        match value {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Color adjustment sliders. `None` means "leave untouched".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColorAdjustments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadows: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibrance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpness: Option<f64>,
}

/// Color filter job parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    /// Named preset; overrides every slider when it resolves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_name: Option<String>,

    /// Object key of a `.cube` lookup table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lut_key: Option<String>,

    #[serde(flatten)]
    pub adjustments: ColorAdjustments,
}

/// Speed change job parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpeedParams {
    pub speed: f64,
    /// Output quality label, e.g. `720p` or `4k`.
    #[serde(default = "default_quality")]
    pub quality: String,
}

fn default_quality() -> String {
    "720p".to_string()
}

impl SpeedParams {
    pub fn new(speed: f64) -> Self {
        Self {
            speed,
            quality: default_quality(),
        }
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    pub fn validate(&self) -> ParamsResult<()> {
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(ParamsError::SpeedOutOfRange(self.speed));
        }
        Ok(())
    }
}

/// Compression job parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompressionParams {
    /// Target size such as `500KB` or `5MB`.
    pub target_size: String,
}

impl CompressionParams {
    pub fn new(target_size: impl Into<String>) -> Self {
        Self {
            target_size: target_size.into(),
        }
    }

    pub fn validate(&self) -> ParamsResult<()> {
        if !TARGET_SIZE_RE.is_match(&self.target_size) {
            return Err(ParamsError::InvalidTargetSize(self.target_size.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    Video,
    Image,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Image => "image",
        }
    }
}

/// Format conversion job parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversionParams {
    pub target_format: String,
    pub media_type: MediaType,
}

impl ConversionParams {
    pub fn new(target_format: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            target_format: target_format.into(),
            media_type,
        }
    }

    /// Upper-case format name handed to the conversion script.
    pub fn normalized_format(&self) -> String {
        match self.target_format.to_uppercase().as_str() {
            "JPEG" => "JPG".to_string(),
            other => other.to_string(),
        }
    }

    /// File extension of the converted output.
    pub fn extension(&self) -> String {
        self.normalized_format().to_lowercase()
    }

    pub fn validate(&self) -> ParamsResult<()> {
        let format = self.normalized_format();
        let supported: &[&str] = match self.media_type {
            MediaType::Video => &VIDEO_FORMATS,
            MediaType::Image => &IMAGE_FORMATS,
        };
        if !supported.contains(&format.as_str()) {
            return Err(ParamsError::UnsupportedFormat {
                media_type: self.media_type.as_str(),
                format: self.target_format.clone(),
            });
        }
        Ok(())
    }
}

/// Background removal has no tunables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundRemovalParams {}

/// Operations understood by the document converter script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentOperation {
    CompressPdf,
    UnlockPdf,
    LockPdf,
    PdfToImages,
    SplitPdf,
    RotatePdf,
    AddWatermark,
    RearrangePdf,
    MergePdf,
    ImagesToPdf,
}

impl DocumentOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentOperation::CompressPdf => "COMPRESS_PDF",
            DocumentOperation::UnlockPdf => "UNLOCK_PDF",
            DocumentOperation::LockPdf => "LOCK_PDF",
            DocumentOperation::PdfToImages => "PDF_TO_IMAGES",
            DocumentOperation::SplitPdf => "SPLIT_PDF",
            DocumentOperation::RotatePdf => "ROTATE_PDF",
            DocumentOperation::AddWatermark => "ADD_WATERMARK",
            DocumentOperation::RearrangePdf => "REARRANGE_PDF",
            DocumentOperation::MergePdf => "MERGE_PDF",
            DocumentOperation::ImagesToPdf => "IMAGES_TO_PDF",
        }
    }

    /// Operations that take `<output> <input...>` instead of `<input> <output>`.
    pub fn takes_many_inputs(&self) -> bool {
        matches!(self, DocumentOperation::MergePdf | DocumentOperation::ImagesToPdf)
    }

    /// Extension of the single produced artifact.
    pub fn output_extension(&self) -> &'static str {
        match self {
            DocumentOperation::PdfToImages | DocumentOperation::SplitPdf => "zip",
            _ => "pdf",
        }
    }
}

/// Document operation job parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentParams {
    pub operation: DocumentOperation,

    /// Further source keys for multi-input operations; the job's own
    /// source key is always the first input.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_source_keys: Vec<String>,

    /// Operation options forwarded to the script as a JSON argument.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl DocumentParams {
    pub fn new(operation: DocumentOperation) -> Self {
        Self {
            operation,
            extra_source_keys: Vec::new(),
            options: Map::new(),
        }
    }

    pub fn with_extra_source(mut self, key: impl Into<String>) -> Self {
        self.extra_source_keys.push(key.into());
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    pub fn validate(&self) -> ParamsResult<()> {
        if self.operation == DocumentOperation::MergePdf && self.extra_source_keys.is_empty() {
            return Err(ParamsError::MissingSources {
                operation: self.operation.as_str(),
                min: 2,
            });
        }
        Ok(())
    }
}

/// Reframe a video onto a canvas of a new shape.
///
/// The canvas comes from both output dimensions when given, otherwise from
/// the aspect ratio applied to the source. The source is scaled by `scale`
/// and centred, then shifted by the position offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AspectRatioParams {
    /// `W:H`, e.g. `9:16`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_height: Option<u32>,
    /// Horizontal offset of the scaled source from the canvas centre.
    #[serde(default)]
    pub position_x: i32,
    /// Vertical offset of the scaled source from the canvas centre.
    #[serde(default)]
    pub position_y: i32,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl AspectRatioParams {
    pub fn with_ratio(ratio: impl Into<String>) -> Self {
        Self {
            aspect_ratio: Some(ratio.into()),
            output_width: None,
            output_height: None,
            position_x: 0,
            position_y: 0,
            scale: default_scale(),
        }
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            aspect_ratio: None,
            output_width: Some(width),
            output_height: Some(height),
            position_x: 0,
            position_y: 0,
            scale: default_scale(),
        }
    }

    pub fn positioned(mut self, x: i32, y: i32) -> Self {
        self.position_x = x;
        self.position_y = y;
        self
    }

    pub fn scaled(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Explicit canvas size, when both dimensions are set.
    pub fn output_size(&self) -> Option<(u32, u32)> {
        self.output_width.zip(self.output_height)
    }

    /// Parsed `W:H` ratio.
    pub fn ratio(&self) -> ParamsResult<Option<(u32, u32)>> {
        let Some(raw) = self.aspect_ratio.as_deref() else {
            return Ok(None);
        };
        let invalid = || ParamsError::InvalidAspectRatio(raw.to_string());
        let (w, h) = raw.split_once(':').ok_or_else(invalid)?;
        let w: u32 = w.trim().parse().map_err(|_| invalid())?;
        let h: u32 = h.trim().parse().map_err(|_| invalid())?;
        if w == 0 || h == 0 {
            return Err(invalid());
        }
        Ok(Some((w, h)))
    }

    pub fn validate(&self) -> ParamsResult<()> {
        if self.output_width == Some(0) {
            return Err(ParamsError::NonPositiveDimension("outputWidth"));
        }
        if self.output_height == Some(0) {
            return Err(ParamsError::NonPositiveDimension("outputHeight"));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ParamsError::InvalidScale(self.scale));
        }
        let ratio = self.ratio()?;
        if ratio.is_none() && self.output_size().is_none() {
            return Err(ParamsError::MissingCanvas);
        }
        Ok(())
    }
}

/// One timed line of subtitle text. Times are seconds from the start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl SubtitleCue {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Burn the given cues into a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleParams {
    pub cues: Vec<SubtitleCue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
}

impl SubtitleParams {
    pub fn new(cues: Vec<SubtitleCue>) -> Self {
        Self {
            cues,
            font_size: None,
        }
    }

    pub fn with_font_size(mut self, size: u32) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn validate(&self) -> ParamsResult<()> {
        if self.cues.is_empty() {
            return Err(ParamsError::NoSubtitleCues);
        }
        for (index, cue) in self.cues.iter().enumerate() {
            let reason = if !(cue.start.is_finite() && cue.start >= 0.0) {
                Some("start must be a non-negative time")
            } else if !(cue.end.is_finite() && cue.end > cue.start) {
                Some("end must come after start")
            } else if cue.text.trim().is_empty() {
                Some("text is empty")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ParamsError::InvalidCue { index, reason });
            }
        }
        if let Some(size) = self.font_size {
            if !FONT_SIZE_RANGE.contains(&size) {
                return Err(ParamsError::FontSizeOutOfRange(size));
            }
        }
        Ok(())
    }
}
