//! Burning timed text into a video.
//!
//! Cues are written to an SRT file next to the input and rendered by
//! ffmpeg's `subtitles` filter. The filter receives a bare file name, so
//! the command must run from the directory holding that file.

use std::fmt::Write;
use std::path::Path;

use mflow_models::{SubtitleCue, SubtitleParams};

use crate::command::Transcode;

/// `HH:MM:SS,mmm`
pub fn srt_timestamp(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let (h, rest) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (m, rest) = (rest / 60_000, rest % 60_000);
    format!("{:02}:{:02}:{:02},{:03}", h, m, rest / 1000, rest % 1000)
}

/// Cues in SRT form, numbered from 1 in the given order.
pub fn render_srt(cues: &[SubtitleCue]) -> String {
    let mut srt = String::new();
    for (i, cue) in cues.iter().enumerate() {
        let _ = write!(
            srt,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            srt_timestamp(cue.start),
            srt_timestamp(cue.end),
            cue.text.trim()
        );
    }
    srt
}

/// `subtitles=<file>` with an optional font size override.
pub fn subtitles_filter(srt_file_name: &str, font_size: Option<u32>) -> String {
    let name = srt_file_name.replace('\'', "");
    match font_size {
        Some(size) => format!("subtitles='{}':force_style='Fontsize={}'", name, size),
        None => format!("subtitles='{}'", name),
    }
}

pub fn build_subtitle_command(
    input: &Path,
    output: &Path,
    srt_file_name: &str,
    params: &SubtitleParams,
) -> Transcode {
    Transcode::new(input, output)
        .video_filter(&subtitles_filter(srt_file_name, params.font_size))
        .x264("medium", Some(23))
        .opt("-pix_fmt", "yuv420p")
        .aac("192k")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps() {
        assert_eq!(srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(srt_timestamp(1.5), "00:00:01,500");
        assert_eq!(srt_timestamp(3723.0456), "01:02:03,046");
    }

    #[test]
    fn test_render_numbers_cues() {
        let srt = render_srt(&[
            SubtitleCue::new(0.0, 1.25, " Hello "),
            SubtitleCue::new(2.0, 4.0, "two\nlines"),
        ]);
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:01,250\nHello\n\n2\n00:00:02,000 --> 00:00:04,000\ntwo\nlines\n\n"
        );
    }

    #[test]
    fn test_filter_font_size() {
        assert_eq!(subtitles_filter("cues.srt", None), "subtitles='cues.srt'");
        assert_eq!(
            subtitles_filter("cues.srt", Some(32)),
            "subtitles='cues.srt':force_style='Fontsize=32'"
        );
    }

    #[test]
    fn test_command_reencodes_video() {
        let params = SubtitleParams::new(vec![SubtitleCue::new(0.0, 1.0, "hi")]);
        let args = build_subtitle_command(Path::new("/w/in.mp4"), Path::new("/w/out.mp4"), "cues.srt", &params)
            .to_args();
        assert!(args.windows(2).any(|w| w == ["-vf", "subtitles='cues.srt'"]));
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
    }
}
