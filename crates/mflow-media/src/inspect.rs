//! Stream metadata read through ffprobe's JSON output.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{MediaError, MediaResult};
use crate::invoker::ToolCommand;

/// Geometry and timing of the first video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Frames per second
    pub fps: f64,
    /// Duration in seconds
    pub duration: f64,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

/// `ffprobe -v error -print_format json -show_format -show_streams <input>`
pub fn stream_info_command(ffprobe: impl Into<PathBuf>, input: &Path) -> ToolCommand {
    ToolCommand::new(ffprobe)
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(input.to_string_lossy().into_owned())
}

/// Parse the JSON printed by [`stream_info_command`].
///
/// Fails when there is no video stream with dimensions or no positive
/// duration. A missing frame rate falls back to 30.
pub fn parse_video_info(json: &str) -> MediaResult<VideoInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| MediaError::Metadata(format!("malformed ffprobe output: {}", e)))?;

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| MediaError::Metadata("no video stream".to_string()))?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(MediaError::Metadata("video stream has no dimensions".to_string())),
    };

    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    let duration = output
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| MediaError::Metadata("no positive duration".to_string()))?;

    Ok(VideoInfo {
        width,
        height,
        fps,
        duration,
        has_audio: output
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio")),
    })
}

/// Parse `30000/1001` or `25` into frames per second.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORTRAIT_PHONE_CLIP: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "audio", "codec_name": "aac"},
            {"index": 1, "codec_type": "video", "codec_name": "h264",
             "width": 1080, "height": 1920,
             "r_frame_rate": "30/1", "avg_frame_rate": "30000/1001"}
        ],
        "format": {"duration": "12.480000", "size": "5242880"}
    }"#;

    #[test]
    fn test_parse_video_info() {
        let info = parse_video_info(PORTRAIT_PHONE_CLIP).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));
        assert!((info.fps - 29.97).abs() < 0.01);
        assert!((info.duration - 12.48).abs() < 1e-9);
        assert!(info.has_audio);
    }

    #[test]
    fn test_duration_falls_back_to_stream() {
        let json = r#"{"streams":[{"codec_type":"video","width":640,"height":360,
            "avg_frame_rate":"0/0","r_frame_rate":"25/1","duration":"3.5"}]}"#;
        let info = parse_video_info(json).unwrap();
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.duration, 3.5);
        assert!(!info.has_audio);
    }

    #[test]
    fn test_audio_only_is_rejected() {
        let json = r#"{"streams":[{"codec_type":"audio"}],"format":{"duration":"9.0"}}"#;
        let err = parse_video_info(json).unwrap_err();
        assert!(matches!(err, MediaError::Metadata(_)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_video_info("Invalid data found when processing input").is_err());
    }

    #[test]
    fn test_frame_rates() {
        assert_eq!(parse_frame_rate("24"), Some(24.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("n/a"), None);
    }

    #[test]
    fn test_command_prints_json() {
        let cmd = stream_info_command("ffprobe", Path::new("/w/in.mp4"));
        let args = cmd.get_args();
        assert_eq!(args.last().map(String::as_str), Some("/w/in.mp4"));
        assert!(args.windows(2).any(|w| w == ["-print_format", "json"]));
        assert_eq!(cmd.expected_output(), None);
    }
}
