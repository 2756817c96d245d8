//! Process execution utilities with timeout support
//!
//! Single chokepoint for running external binaries (yt-dlp, ffmpeg, ffprobe,
//! fpcalc) so that logging, deadline enforcement, and error shape stay uniform
//! across the pipeline. A process that overruns its deadline is killed, never
//! left running.

use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use crate::core::error::{AppError, AppResult};

/// How much of stderr to keep in a `ProcessFailure` (the tail carries the
/// actual error; yt-dlp prefixes hundreds of progress lines).
const STDERR_TAIL_CHARS: usize = 400;

/// Captured output of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run an external command with a deadline, capturing stdout/stderr.
///
/// Fails with `ProcessFailure` on non-zero exit and `ProcessTimeout` when the
/// deadline elapses. `kill_on_drop` guarantees the child is reaped when the
/// timeout fires.
pub async fn run_command(bin: &str, args: &[&str], timeout: Duration) -> AppResult<ProcessOutput> {
    run_command_in(bin, args, None, timeout).await
}

/// Same as [`run_command`] but with an explicit working directory.
///
/// The download engine runs yt-dlp with the request's working directory as
/// cwd so output templates stay relative and the post-run file scan is
/// trivially scoped.
pub async fn run_command_in(
    bin: &str,
    args: &[&str],
    current_dir: Option<&Path>,
    timeout: Duration,
) -> AppResult<ProcessOutput> {
    let mut cmd = Command::new(bin);
    cmd.args(args).kill_on_drop(true);
    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }

    log::debug!("running: {} {}", bin, args.join(" "));

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(AppError::Io(e)),
        Err(_) => {
            log::error!("{} timed out after {}s, killing", bin, timeout.as_secs());
            return Err(AppError::ProcessTimeout {
                secs: timeout.as_secs(),
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        let tail: String = stderr
            .chars()
            .skip(stderr.chars().count().saturating_sub(STDERR_TAIL_CHARS))
            .collect();
        log::warn!("{} exited with {:?}: {}", bin, output.status.code(), tail.trim());
        return Err(AppError::ProcessFailure {
            exit_code: output.status.code(),
            stderr_tail: tail.trim().to_string(),
        });
    }

    Ok(ProcessOutput { stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_command_captures_stdout() {
        let out = run_command("sh", &["-c", "printf hello"], Duration::from_secs(5))
            .await
            .expect("sh should run");
        assert_eq!(out.stdout, "hello");
    }

    #[tokio::test]
    async fn test_run_command_nonzero_exit() {
        let err = run_command("sh", &["-c", "echo oops >&2; exit 3"], Duration::from_secs(5))
            .await
            .expect_err("non-zero exit should fail");
        match err {
            AppError::ProcessFailure {
                exit_code,
                stderr_tail,
            } => {
                assert_eq!(exit_code, Some(3));
                assert!(stderr_tail.contains("oops"));
            }
            other => panic!("expected ProcessFailure, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_command_timeout_kills() {
        let err = run_command("sleep", &["30"], Duration::from_millis(100))
            .await
            .expect_err("sleep should time out");
        assert!(matches!(err, AppError::ProcessTimeout { .. }));
    }

    #[tokio::test]
    async fn test_run_command_missing_binary() {
        let err = run_command("/nonexistent/binary-42", &[], Duration::from_secs(1))
            .await
            .expect_err("missing binary should fail");
        assert!(matches!(err, AppError::Io(_)));
    }

    #[tokio::test]
    async fn test_run_command_in_respects_cwd() {
        let dir = tempfile::tempdir().expect("tempdir");
        run_command_in("sh", &["-c", "touch marker.txt"], Some(dir.path()), Duration::from_secs(5))
            .await
            .expect("touch should run");
        assert!(dir.path().join("marker.txt").exists());
    }

    #[tokio::test]
    async fn test_stderr_tail_is_bounded() {
        let err = run_command(
            "sh",
            &["-c", "yes x | head -c 5000 >&2; exit 1"],
            Duration::from_secs(5),
        )
        .await
        .expect_err("should fail");
        match err {
            AppError::ProcessFailure { stderr_tail, .. } => {
                assert!(stderr_tail.chars().count() <= STDERR_TAIL_CHARS);
            }
            other => panic!("expected ProcessFailure, got: {:?}", other),
        }
    }
}
