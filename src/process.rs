//! External process execution with timeout, capture, and retry.
//!
//! Every external tool this pipeline touches — the headless browser, the
//! office converter, the PDF optimizer — goes through [`run`] or
//! [`run_with_retry`]. Commands are argument vectors, never shell strings,
//! so file names with spaces or quotes can never change what gets executed.
//!
//! ## Timeout discipline
//!
//! A hung external tool must never hang the batch. Children are spawned
//! with `kill_on_drop`, and the wait is wrapped in `tokio::time::timeout`;
//! when the deadline passes the wait future is dropped, the child is sent
//! a kill, and the attempt is recorded as a timeout failure.
//!
//! ## Retry Strategy
//!
//! Transient failures (non-zero exit, timeout) are retried up to the
//! attempt budget with a linearly increasing backoff (`attempt × base`,
//! default 2 s → 4 s). "Command not found" is a configuration error, not a
//! transient failure — retrying would spend the full backoff budget on a
//! guaranteed-identical outcome, so it is surfaced immediately as
//! [`FileError::CapabilityMissing`].

use crate::error::FileError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Captured outcome of a completed external process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Options for a single invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub timeout_ms: u64,
    pub working_dir: Option<PathBuf>,
}

impl RunOptions {
    pub fn with_timeout(timeout_ms: u64) -> Self {
        RunOptions {
            timeout_ms,
            working_dir: None,
        }
    }

    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

/// Keep only the last few lines of stderr for error messages and logs.
fn stderr_tail(stderr: &str) -> String {
    const TAIL_LINES: usize = 5;
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    lines[start..].join("\n")
}

/// Execute `program args…` once, capturing stdout/stderr.
///
/// `name` is a short human label ("chromium", "soffice", "gs") used in logs
/// and error messages; `program` is the resolved binary path or command.
///
/// # Errors
/// * [`FileError::CapabilityMissing`] — binary not found (never retried)
/// * [`FileError::ProcessTimeout`] — deadline exceeded; child killed
/// * [`FileError::ProcessFailed`] — non-zero exit, with captured stderr tail
pub async fn run(
    name: &str,
    program: &str,
    args: &[String],
    options: &RunOptions,
) -> Result<ProcessOutput, FileError> {
    let start = Instant::now();
    info!("[{}] running: {} {}", name, program, args.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(ref dir) = options.working_dir {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FileError::CapabilityMissing {
                tool: name.to_string(),
                hint: format!("'{program}' was not found on PATH."),
            }
        } else {
            FileError::ProcessFailed {
                name: name.to_string(),
                code: None,
                stderr_tail: format!("spawn failed: {e}"),
            }
        }
    })?;

    // Dropping the wait future on timeout kills the child (kill_on_drop).
    let output = match timeout(
        Duration::from_millis(options.timeout_ms),
        child.wait_with_output(),
    )
    .await
    {
        Ok(Ok(out)) => out,
        Ok(Err(e)) => {
            return Err(FileError::ProcessFailed {
                name: name.to_string(),
                code: None,
                stderr_tail: format!("wait failed: {e}"),
            });
        }
        Err(_) => {
            warn!(
                "[{}] timed out after {}ms, killing child",
                name, options.timeout_ms
            );
            return Err(FileError::ProcessTimeout {
                name: name.to_string(),
                timeout_ms: options.timeout_ms,
            });
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let tail = stderr_tail(&stderr);
        warn!(
            "[{}] exited {:?} after {}ms: {}",
            name,
            output.status.code(),
            duration_ms,
            tail
        );
        return Err(FileError::ProcessFailed {
            name: name.to_string(),
            code: output.status.code(),
            stderr_tail: tail,
        });
    }

    debug!("[{}] succeeded in {}ms", name, duration_ms);
    Ok(ProcessOutput {
        exit_code: output.status.code().unwrap_or(0),
        stdout,
        stderr,
        duration_ms,
    })
}

/// [`run`] with an attempt budget and linear backoff.
///
/// The wait before attempt N (1-indexed) is `N × base_delay_ms`. Capability
/// errors short-circuit immediately: a missing binary will still be missing
/// two seconds from now.
pub async fn run_with_retry(
    name: &str,
    program: &str,
    args: &[String],
    options: &RunOptions,
    attempts: u32,
    base_delay_ms: u64,
) -> Result<ProcessOutput, FileError> {
    let attempts = attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            let backoff = u64::from(attempt - 1) * base_delay_ms;
            warn!(
                "[{}] retry {}/{} after {}ms",
                name, attempt, attempts, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match run(name, program, args, options).await {
            Ok(out) => return Ok(out),
            Err(e @ FileError::CapabilityMissing { .. }) => return Err(e),
            Err(e) => {
                warn!("[{}] attempt {}/{} failed: {}", name, attempt, attempts, e);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.expect("at least one attempt was made"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(ms: u64) -> RunOptions {
        RunOptions::with_timeout(ms)
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = run("echo", "echo", &["hello".to_string()], &opts(5_000))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_process_failed() {
        let args = vec!["-c".to_string(), "echo oops >&2; exit 3".to_string()];
        let err = run("sh", "sh", &args, &opts(5_000)).await.unwrap_err();
        match err {
            FileError::ProcessFailed {
                code, stderr_tail, ..
            } => {
                assert_eq!(code, Some(3));
                assert!(stderr_tail.contains("oops"));
            }
            other => panic!("expected ProcessFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_kills_and_reports() {
        let args = vec!["5".to_string()];
        let start = Instant::now();
        let err = run("sleep", "sleep", &args, &opts(200)).await.unwrap_err();
        assert!(matches!(err, FileError::ProcessTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn missing_binary_is_capability_error() {
        let err = run("ghost-tool", "definitely-not-a-real-binary-a7f3", &[], &opts(1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::CapabilityMissing { .. }));
    }

    #[tokio::test]
    async fn retry_does_not_retry_missing_binary() {
        let start = Instant::now();
        let err = run_with_retry(
            "ghost-tool",
            "definitely-not-a-real-binary-a7f3",
            &[],
            &opts(1_000),
            3,
            2_000,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FileError::CapabilityMissing { .. }));
        // Three attempts with linear backoff would take ≥ 6 s; immediate
        // short-circuit means no backoff was spent.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn retry_eventually_reports_last_error() {
        let args = vec!["-c".to_string(), "exit 1".to_string()];
        let err = run_with_retry("sh", "sh", &args, &opts(5_000), 2, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::ProcessFailed { .. }));
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let long = (0..20).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        let tail = stderr_tail(&long);
        assert!(tail.contains("line19"));
        assert!(!tail.contains("line0"));
    }
}
