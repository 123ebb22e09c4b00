//! FFmpeg transcode description.

use std::path::{Path, PathBuf};

use crate::invoker::ToolCommand;

/// One input, one output, and the encoder options between them.
///
/// Rendered as `-i <input> <options...> -y <output>`. Options keep the
/// order in which they were added.
#[derive(Debug, Clone)]
pub struct Transcode {
    source: PathBuf,
    target: PathBuf,
    options: Vec<String>,
}

impl Transcode {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            options: Vec::new(),
        }
    }

    /// Append a `flag value` pair.
    pub fn opt(mut self, flag: &str, value: impl ToString) -> Self {
        self.options.push(flag.to_owned());
        self.options.push(value.to_string());
        self
    }

    /// Append raw options verbatim.
    pub fn raw<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.options.extend(options.into_iter().map(|o| o.to_string()));
        self
    }

    pub fn video_filter(self, graph: &str) -> Self {
        self.opt("-vf", graph)
    }

    /// H.264 video at the given preset and, when set, constant rate factor.
    pub fn x264(self, preset: &str, crf: Option<u8>) -> Self {
        let cmd = self.opt("-c:v", "libx264").opt("-preset", preset);
        match crf {
            Some(crf) => cmd.opt("-crf", crf),
            None => cmd,
        }
    }

    /// AAC audio at a fixed bitrate such as `192k`.
    pub fn aac(self, bitrate: &str) -> Self {
        self.opt("-c:a", "aac").opt("-b:a", bitrate)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn to_args(&self) -> Vec<String> {
        let source = self.source.to_string_lossy().into_owned();
        let target = self.target.to_string_lossy().into_owned();
        ["-i".to_owned(), source]
            .into_iter()
            .chain(self.options.iter().cloned())
            .chain(["-y".to_owned(), target])
            .collect()
    }

    /// Bind to an ffmpeg binary. The target must exist afterwards.
    pub fn into_tool(self, ffmpeg: impl Into<PathBuf>) -> ToolCommand {
        ToolCommand::new(ffmpeg)
            .args(self.to_args())
            .expect_output(self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_keep_insertion_order() {
        let args = Transcode::new("/in.mp4", "/out.mp4")
            .video_filter("eq=contrast=1.200")
            .x264("medium", Some(23))
            .aac("192k")
            .to_args();
        assert_eq!(
            args,
            vec![
                "-i",
                "/in.mp4",
                "-vf",
                "eq=contrast=1.200",
                "-c:v",
                "libx264",
                "-preset",
                "medium",
                "-crf",
                "23",
                "-c:a",
                "aac",
                "-b:a",
                "192k",
                "-y",
                "/out.mp4"
            ]
        );
    }

    #[test]
    fn test_x264_without_crf() {
        let args = Transcode::new("a", "b").x264("fast", None).to_args();
        assert!(!args.iter().any(|a| a == "-crf"));
    }

    #[test]
    fn test_into_tool_expects_target() {
        let tool = Transcode::new("/in.mp4", "/out.mp4").into_tool("ffmpeg");
        assert_eq!(tool.expected_output(), Some(Path::new("/out.mp4")));
        assert_eq!(tool.get_args().first().map(String::as_str), Some("-i"));
    }
}
