//! Tool execution metrics.

use std::time::Duration;

use metrics::{counter, histogram};

pub mod names {
    /// Tool runs by tool and outcome.
    pub const TOOL_RUNS_TOTAL: &str = "mflow_media_tool_runs_total";

    /// Wall-clock tool duration in seconds.
    pub const TOOL_DURATION_SECONDS: &str = "mflow_media_tool_duration_seconds";
}

pub fn record_tool_run(tool: &str, outcome: &'static str, elapsed: Duration) {
    counter!(names::TOOL_RUNS_TOTAL, "tool" => tool.to_string(), "outcome" => outcome).increment(1);
    histogram!(names::TOOL_DURATION_SECONDS, "tool" => tool.to_string()).record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_tool_run("ffmpeg", "success", Duration::from_millis(5));
        assert!(names::TOOL_RUNS_TOTAL.starts_with("mflow_media_"));
    }
}
