//! External tool invoker.
//!
//! Runs a subprocess with a prepared argument vector, drains stdout and
//! stderr on two independent tasks so neither pipe can fill up and stall
//! the child, and applies the success rule: exit code 0 **and** a
//! non-empty file at the expected output path.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, trace, warn};

use crate::error::{MediaError, MediaResult};
use crate::metrics;

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Builder for a single tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    expected_output: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            expected_output: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Path that must exist and be non-empty for the run to count as a success.
    pub fn expect_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.expected_output = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn expected_output(&self) -> Option<&Path> {
        self.expected_output.as_deref()
    }

    /// Short program name used in logs and errors.
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }

    /// Spawn the process and capture both streams. No success check.
    pub async fn run(&self) -> MediaResult<ToolOutput> {
        let tool = self.tool_name();
        debug!("Running {} {}", self.program.display(), self.args.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MediaError::ToolNotFound(self.program.display().to_string())
            } else {
                MediaError::Io(e)
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr not captured"))?;

        let stdout_task = tokio::spawn(drain(stdout, tool.clone(), "stdout"));
        let stderr_task = tokio::spawn(drain(stderr, tool.clone(), "stderr"));

        let joined = async {
            let (status, stdout, stderr) = tokio::join!(child.wait(), stdout_task, stderr_task);
            (status, stdout.unwrap_or_default(), stderr.unwrap_or_default())
        };

        let (status, stdout, stderr) = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, joined).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("{} timed out after {:?}, killing process", tool, limit);
                    metrics::record_tool_run(&tool, "timeout", started.elapsed());
                    return Err(MediaError::Timeout {
                        tool,
                        secs: limit.as_secs(),
                    });
                }
            },
            None => joined.await,
        };

        let status = status?;
        let elapsed = started.elapsed();

        Ok(ToolOutput {
            exit_code: status.code(),
            stdout,
            stderr,
            elapsed,
        })
    }

    /// Run and enforce the success rule.
    pub async fn execute(&self) -> MediaResult<ToolOutput> {
        let tool = self.tool_name();
        let output = self.run().await?;

        if !output.success() {
            warn!(
                "{} failed with exit code {:?}: {}",
                tool,
                output.exit_code,
                output.stderr.trim()
            );
            metrics::record_tool_run(&tool, "failed", output.elapsed);
            return Err(MediaError::tool_failed(tool, output.exit_code, output.stderr));
        }

        if let Some(path) = &self.expected_output {
            if !is_non_empty_file(path).await {
                warn!("{} exited 0 but {} is missing or empty", tool, path.display());
                metrics::record_tool_run(&tool, "missing_output", output.elapsed);
                return Err(MediaError::MissingOutput {
                    tool,
                    path: path.clone(),
                    stderr: output.stderr,
                });
            }
        }

        info!("{} finished in {:.1}s", tool, output.elapsed.as_secs_f64());
        metrics::record_tool_run(&tool, "success", output.elapsed);
        Ok(output)
    }
}

async fn drain<R>(reader: R, tool: String, stream: &'static str) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut captured = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                trace!(tool = %tool, stream, "{}", String::from_utf8_lossy(&line).trim_end());
                captured.extend_from_slice(&line);
            }
            Err(e) => {
                warn!("Failed reading {} of {}: {}", stream, tool, e);
                break;
            }
        }
    }

    String::from_utf8_lossy(&captured).into_owned()
}

async fn is_non_empty_file(path: &Path) -> bool {
    matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.is_file() && meta.len() > 0)
}

/// Resolve a program on PATH, or verify an explicit path exists.
pub fn ensure_available(program: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let program = program.as_ref();
    if program.components().count() > 1 {
        return if program.is_file() {
            Ok(program.to_path_buf())
        } else {
            Err(MediaError::ToolNotFound(program.display().to_string()))
        };
    }
    which::which(program).map_err(|_| MediaError::ToolNotFound(program.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_captures_both_streams() {
        let output = sh("echo out; echo err >&2").run().await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_large_output_on_both_streams_does_not_deadlock() {
        let output = sh("head -c 300000 /dev/zero | tr '\\0' a; head -c 300000 /dev/zero | tr '\\0' b >&2")
            .timeout(Duration::from_secs(20))
            .run()
            .await
            .unwrap();
        assert_eq!(output.stdout.len(), 300_000);
        assert_eq!(output.stderr.len(), 300_000);
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let err = assert_err!(sh("echo 'bad input' >&2; exit 3").execute().await);
        match err {
            MediaError::ToolFailed { exit_code, stderr, .. } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr.trim(), "bad input");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_exit_without_output_is_distinct_failure() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.mp4");
        let err = sh("echo 'wrote nothing' >&2")
            .expect_output(&out)
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::MissingOutput { .. }));
        assert_eq!(err.stderr().map(str::trim), Some("wrote nothing"));
    }

    #[tokio::test]
    async fn test_zero_exit_with_empty_output_fails() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.mp4");
        let err = sh(&format!("touch '{}'", out.display()))
            .expect_output(&out)
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::MissingOutput { .. }));
    }

    #[tokio::test]
    async fn test_success_with_output() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.mp4");
        let output = assert_ok!(
            sh(&format!("printf data > '{}'", out.display()))
                .expect_output(&out)
                .execute()
                .await
        );
        assert!(output.success());
    }

    #[tokio::test]
    async fn test_working_dir() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("marker.txt"), b"x").await.unwrap();
        let output = sh("ls").working_dir(dir.path()).execute().await.unwrap();
        assert!(output.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = ToolCommand::new("definitely_not_a_tool_98231")
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_timeout_kills() {
        let err = sh("sleep 5")
            .timeout(Duration::from_millis(100))
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Timeout { .. }));
    }

    #[test]
    fn test_ensure_available() {
        assert!(ensure_available("sh").is_ok());
        assert!(ensure_available("/no/such/dir/tool").is_err());
        assert!(ensure_available("definitely_not_a_tool_98231").is_err());
    }
}
