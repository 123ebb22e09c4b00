//! Reframing a video onto a canvas of a different shape.
//!
//! The source is scaled, centred on a black canvas, then shifted by the
//! requested offsets. Every dimension handed to the encoder is even.

use std::path::Path;

use mflow_models::AspectRatioParams;

use crate::command::Transcode;
use crate::error::{MediaError, MediaResult};
use crate::inspect::VideoInfo;

/// Round up to the next even pixel count, never below 2.
fn even(value: f64) -> u32 {
    let n = (value.ceil() as u32).max(2);
    n + n % 2
}

/// Canvas size: the explicit output size when set, otherwise the source
/// widened or heightened to the requested ratio.
pub fn canvas_size(params: &AspectRatioParams, source: &VideoInfo) -> MediaResult<(u32, u32)> {
    if let Some((w, h)) = params.output_size() {
        return Ok((even(w as f64), even(h as f64)));
    }

    let (rw, rh) = params
        .ratio()
        .map_err(|e| MediaError::invalid_params(e.to_string()))?
        .ok_or_else(|| MediaError::invalid_params("no aspect ratio or output size"))?;
    let (w, h) = (source.width as u64, source.height as u64);
    let (rw, rh) = (rw as u64, rh as u64);

    // Compare w/h against rw/rh without dividing.
    if w * rh > h * rw {
        Ok((even(w as f64), even((w * rh) as f64 / rw as f64)))
    } else {
        Ok((even((h * rw) as f64 / rh as f64), even(h as f64)))
    }
}

/// Source size after applying the scale factor.
pub fn scaled_size(params: &AspectRatioParams, source: &VideoInfo) -> (u32, u32) {
    (
        even(source.width as f64 * params.scale),
        even(source.height as f64 * params.scale),
    )
}

pub fn build_aspect_command(
    input: &Path,
    output: &Path,
    params: &AspectRatioParams,
    source: &VideoInfo,
) -> MediaResult<Transcode> {
    let (cw, ch) = canvas_size(params, source)?;
    let (sw, sh) = scaled_size(params, source);

    let graph = format!(
        "color=c=black:s={cw}x{ch}:d={dur:.6}[base];\
         [0:v]scale={sw}:{sh}:flags=lanczos[scaled];\
         [base][scaled]overlay=x='(W/2)+({px})-(w/2)':y='(H/2)+({py})-(h/2)':format=auto[vout]",
        dur = source.duration,
        px = params.position_x,
        py = params.position_y,
    );

    Ok(Transcode::new(input, output)
        .opt("-filter_complex", graph)
        .opt("-map", "[vout]")
        .opt("-map", "0:a?")
        .x264("medium", Some(23))
        .opt("-pix_fmt", "yuv420p")
        .aac("192k")
        .opt("-r", format!("{:.2}", source.fps)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landscape() -> VideoInfo {
        VideoInfo {
            width: 1920,
            height: 1080,
            fps: 29.97,
            duration: 10.0,
            has_audio: true,
        }
    }

    #[test]
    fn test_portrait_ratio_keeps_source_width() {
        let params = AspectRatioParams::with_ratio("9:16");
        assert_eq!(canvas_size(&params, &landscape()).unwrap(), (1920, 3414));
    }

    #[test]
    fn test_wider_ratio_keeps_source_height() {
        let params = AspectRatioParams::with_ratio("21:9");
        assert_eq!(canvas_size(&params, &landscape()).unwrap(), (2520, 1080));
    }

    #[test]
    fn test_explicit_size_is_made_even() {
        let params = AspectRatioParams::with_size(1081, 1919);
        assert_eq!(canvas_size(&params, &landscape()).unwrap(), (1082, 1920));
    }

    #[test]
    fn test_scale_rounds_to_even() {
        let params = AspectRatioParams::with_ratio("1:1").scaled(0.333);
        assert_eq!(scaled_size(&params, &landscape()), (640, 360));
    }

    #[test]
    fn test_bad_ratio_is_invalid_params() {
        let params = AspectRatioParams::with_ratio("wide");
        let err = canvas_size(&params, &landscape()).unwrap_err();
        assert!(matches!(err, MediaError::InvalidParams(_)));
    }

    #[test]
    fn test_command_overlays_with_offsets() {
        let params = AspectRatioParams::with_ratio("1:1").positioned(-120, 40);
        let args = build_aspect_command(Path::new("/w/in.mov"), Path::new("/w/out.mp4"), &params, &landscape())
            .unwrap()
            .to_args();

        let graph = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(graph.starts_with("color=c=black:s=1920x1920:d=10.000000[base];"));
        assert!(graph.contains("[0:v]scale=1920:1080:flags=lanczos[scaled]"));
        assert!(graph.ends_with("overlay=x='(W/2)+(-120)-(w/2)':y='(H/2)+(40)-(h/2)':format=auto[vout]"));
        assert!(args.windows(2).any(|w| w == ["-map", "0:a?"]));
        assert!(args.windows(2).any(|w| w == ["-r", "29.97"]));
        assert_eq!(args.last().map(String::as_str), Some("/w/out.mp4"));
    }
}
