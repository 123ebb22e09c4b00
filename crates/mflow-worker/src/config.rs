//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Pause between poll cycles
    pub poll_interval: Duration,
    /// Long-poll wait for a single receive
    pub receive_wait: Duration,
    /// Independent poll loops per process; each runs one job at a time
    pub loops: usize,
    /// Root for per-attempt scratch directories
    pub work_dir: PathBuf,
    /// Download attempts per object
    pub download_retries: u32,
    /// Limit on a single external tool run
    pub tool_timeout: Duration,
    /// Limit on a whole job attempt
    pub job_timeout: Duration,
    /// How long a worker's claim on a job lasts
    pub lease_ttl: Duration,
    /// How often a running job restarts its message's visibility timeout;
    /// must stay below the queue's visibility timeout
    pub heartbeat_interval: Duration,
    /// Lifetime of presigned output URLs when no CDN is configured
    pub signed_url_ttl: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
    pub python_bin: PathBuf,
    pub scripts_dir: PathBuf,
    /// Completion webhook; log-only notification when unset
    pub notify_webhook_url: Option<String>,
    /// Prometheus listener port; no exporter when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            receive_wait: Duration::from_secs(20),
            loops: 1,
            work_dir: PathBuf::from("/tmp/mediaflow"),
            download_retries: 3,
            tool_timeout: Duration::from_secs(1800),
            job_timeout: Duration::from_secs(3600),
            lease_ttl: Duration::from_secs(3900),
            heartbeat_interval: Duration::from_secs(10),
            signed_url_ttl: Duration::from_secs(86400),
            shutdown_timeout: Duration::from_secs(30),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            python_bin: PathBuf::from("python3"),
            scripts_dir: PathBuf::from("scripts"),
            notify_webhook_url: None,
            metrics_port: None,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    Duration::from_secs(env_or(key, default.as_secs()))
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let job_timeout = env_secs("WORKER_JOB_TIMEOUT", defaults.job_timeout);

        Self {
            poll_interval: Duration::from_millis(env_or(
                "WORKER_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
            receive_wait: env_secs("QUEUE_WAIT_SECS", defaults.receive_wait),
            loops: env_or("WORKER_LOOPS", defaults.loops).max(1),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            download_retries: env_or("WORKER_DOWNLOAD_RETRIES", defaults.download_retries),
            tool_timeout: env_secs("WORKER_TOOL_TIMEOUT", defaults.tool_timeout),
            job_timeout,
            lease_ttl: env_secs("WORKER_LEASE_TTL", job_timeout + Duration::from_secs(300)),
            heartbeat_interval: env_secs("WORKER_HEARTBEAT_INTERVAL", defaults.heartbeat_interval),
            signed_url_ttl: env_secs("WORKER_SIGNED_URL_TTL", defaults.signed_url_ttl),
            shutdown_timeout: env_secs("WORKER_SHUTDOWN_TIMEOUT", defaults.shutdown_timeout),
            ffmpeg_bin: std::env::var("FFMPEG_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_bin),
            ffprobe_bin: std::env::var("FFPROBE_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffprobe_bin),
            python_bin: std::env::var("PYTHON_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.python_bin),
            scripts_dir: std::env::var("SCRIPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scripts_dir),
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.download_retries, 3);
        assert_eq!(config.loops, 1);
        assert!(config.lease_ttl > config.job_timeout);
        assert!(config.heartbeat_interval < Duration::from_secs(30));
        assert!(config.notify_webhook_url.is_none());
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("MFLOW_TEST_GARBAGE_NUMBER", "not-a-number");
        assert_eq!(env_or("MFLOW_TEST_GARBAGE_NUMBER", 7u32), 7);
        assert_eq!(env_or("MFLOW_TEST_UNSET_NUMBER", 9u32), 9);
    }
}
