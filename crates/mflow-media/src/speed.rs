//! Playback speed change compilation.

use std::path::Path;

use mflow_models::SpeedParams;

use crate::command::Transcode;

/// Output quality tier for speed-changed video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    P144,
    P240,
    P360,
    P480,
    P720,
    P1080,
    P1440,
    P2160,
}

impl Quality {
    /// Parse a label like `1080p`, `2k` or `4k`. Unknown labels fall back to 720p.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "144p" => Quality::P144,
            "240p" => Quality::P240,
            "360p" => Quality::P360,
            "480p" => Quality::P480,
            "1080p" => Quality::P1080,
            "1440p" | "2k" => Quality::P1440,
            "2160p" | "4k" => Quality::P2160,
            _ => Quality::P720,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Quality::P144 => 144,
            Quality::P240 => 240,
            Quality::P360 => 360,
            Quality::P480 => 480,
            Quality::P720 => 720,
            Quality::P1080 => 1080,
            Quality::P1440 => 1440,
            Quality::P2160 => 2160,
        }
    }

    /// Scale expression preserving aspect ratio with an even width.
    pub fn scale(&self) -> String {
        format!("-2:{}", self.height())
    }

    pub fn crf(&self) -> u8 {
        match self {
            Quality::P144 => 28,
            Quality::P240 => 27,
            Quality::P360 => 26,
            Quality::P480 => 25,
            Quality::P720 => 23,
            Quality::P1080 => 22,
            Quality::P1440 => 20,
            Quality::P2160 => 18,
        }
    }

    pub fn preset(&self) -> &'static str {
        match self {
            Quality::P144 | Quality::P240 => "veryfast",
            Quality::P360 | Quality::P480 => "fast",
            Quality::P720 | Quality::P1080 => "medium",
            Quality::P1440 | Quality::P2160 => "slow",
        }
    }
}

/// Video and audio retimed by the same factor, then scaled to the quality tier.
pub fn build_speed_command(input: &Path, output: &Path, params: &SpeedParams) -> Transcode {
    let quality = Quality::from_label(&params.quality);
    let video = format!("setpts={:.6}*PTS,scale={}", 1.0 / params.speed, quality.scale());
    let audio = format!("atempo={:.6}", params.speed);

    Transcode::new(input, output)
        .opt("-filter:v", video)
        .opt("-filter:a", audio)
        .x264(quality.preset(), Some(quality.crf()))
        .aac("320k")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_table() {
        let q = Quality::from_label("1080p");
        assert_eq!((q.scale().as_str(), q.crf(), q.preset()), ("-2:1080", 22, "medium"));
        let q = Quality::from_label("2K");
        assert_eq!((q.scale().as_str(), q.crf(), q.preset()), ("-2:1440", 20, "slow"));
        let q = Quality::from_label("4k");
        assert_eq!((q.scale().as_str(), q.crf(), q.preset()), ("-2:2160", 18, "slow"));
        let q = Quality::from_label("144p");
        assert_eq!((q.crf(), q.preset()), (28, "veryfast"));
    }

    #[test]
    fn test_unknown_quality_is_720p() {
        assert_eq!(Quality::from_label("8k"), Quality::P720);
        assert_eq!(Quality::from_label(""), Quality::P720);
    }

    #[test]
    fn test_double_speed_args() {
        let params = SpeedParams::new(2.0);
        let args = build_speed_command(Path::new("/in.mp4"), Path::new("/out.mp4"), &params)
            .to_args();
        assert_eq!(
            args,
            vec![
                "-i",
                "/in.mp4",
                "-filter:v",
                "setpts=0.500000*PTS,scale=-2:720",
                "-filter:a",
                "atempo=2.000000",
                "-c:v",
                "libx264",
                "-preset",
                "medium",
                "-crf",
                "23",
                "-c:a",
                "aac",
                "-b:a",
                "320k",
                "-y",
                "/out.mp4"
            ]
        );
    }

    #[test]
    fn test_slow_motion_with_quality() {
        let params = SpeedParams::new(0.5).with_quality("480p");
        let args = build_speed_command(Path::new("/in.mp4"), Path::new("/out.mp4"), &params)
            .to_args();
        assert_eq!(args[3], "setpts=2.000000*PTS,scale=-2:480");
        assert_eq!(args[5], "atempo=0.500000");
        assert!(args.windows(2).any(|w| w == ["-crf", "25"]));
    }
}
