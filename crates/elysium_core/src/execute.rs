//! Isolated, time-bounded execution of extracted code fragments.
//!
//! Fragments run in a separate OS process so a crash or infinite loop cannot
//! take the event loop down with it. Every failure mode - spawn error, wait
//! error, timeout, non-zero exit - is folded into the returned
//! [`ExecutionReport`]; the executor boundary never raises.

use async_trait::async_trait;
use std::fmt::Debug;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::ExecutorSettings;

/// Appended to a captured stream when it was cut at the preview bound.
pub const TRUNCATION_MARKER: &str = "… [truncated]";

/// How one fragment execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The process ran to completion. `exit_code` is `None` when the process
    /// was killed by a signal.
    Completed { exit_code: Option<i32> },
    /// The wall-clock bound expired; the process was terminated.
    TimedOut { limit_secs: u64 },
    /// The process could not be launched or awaited.
    LaunchFailed { detail: String },
}

/// Captured result of attempting to execute one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Captured stdout, truncated to the configured preview bound.
    pub stdout: String,
    /// Captured stderr, truncated to the configured preview bound.
    pub stderr: String,
    pub outcome: ExecutionOutcome,
}

impl ExecutionReport {
    pub fn is_error(&self) -> bool {
        !matches!(
            self.outcome,
            ExecutionOutcome::Completed { exit_code: Some(0) }
        )
    }

    fn launch_failed(detail: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            outcome: ExecutionOutcome::LaunchFailed {
                detail: detail.into(),
            },
        }
    }
}

/// Executes one code fragment and reports the outcome.
///
/// Implementations must not return errors; anything that goes wrong belongs
/// in the report so the caller can splice it into the response inline.
#[async_trait]
pub trait CodeExecutor: Send + Sync + Debug {
    async fn execute(&self, code: &str) -> ExecutionReport;
}

#[async_trait]
impl<T: CodeExecutor + ?Sized> CodeExecutor for std::sync::Arc<T> {
    async fn execute(&self, code: &str) -> ExecutionReport {
        (**self).execute(code).await
    }
}

/// Runs fragments as `<interpreter> -c <code>` in a child process.
///
/// The child inherits the caller's working directory and environment - there
/// is no sandbox. See the crate-level security note.
#[derive(Debug, Clone)]
pub struct SubprocessExecutor {
    settings: ExecutorSettings,
}

impl SubprocessExecutor {
    pub fn new(settings: ExecutorSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl CodeExecutor for SubprocessExecutor {
    async fn execute(&self, code: &str) -> ExecutionReport {
        info!(
            interpreter = %self.settings.interpreter,
            preview = %code.chars().take(80).collect::<String>(),
            "executing knowledge-block fragment"
        );

        // kill_on_drop covers the timeout path: wait_with_output consumes the
        // child, so dropping the future is the only handle we have left.
        let child = Command::new(&self.settings.interpreter)
            .arg("-c")
            .arg(code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!("failed to spawn fragment interpreter: {e}");
                return ExecutionReport::launch_failed(format!(
                    "failed to launch '{}': {e}",
                    self.settings.interpreter
                ));
            }
        };

        let limit = Duration::from_secs(self.settings.timeout_secs);
        match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let exit_code = output.status.code();
                info!(?exit_code, "fragment execution finished");
                ExecutionReport {
                    stdout: truncate_preview(
                        &String::from_utf8_lossy(&output.stdout),
                        self.settings.stdout_preview,
                    ),
                    stderr: truncate_preview(
                        &String::from_utf8_lossy(&output.stderr),
                        self.settings.stderr_preview,
                    ),
                    outcome: ExecutionOutcome::Completed { exit_code },
                }
            }
            Ok(Err(e)) => {
                warn!("failed to collect fragment output: {e}");
                ExecutionReport::launch_failed(format!("failed to collect output: {e}"))
            }
            Err(_) => {
                warn!(
                    "fragment execution timed out after {}s",
                    self.settings.timeout_secs
                );
                ExecutionReport {
                    stdout: String::new(),
                    stderr: String::new(),
                    outcome: ExecutionOutcome::TimedOut {
                        limit_secs: self.settings.timeout_secs,
                    },
                }
            }
        }
    }
}

/// Cut `text` to at most `max_chars`, appending the truncation marker when cut.
fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    // `sh -c` has the same invocation convention as `python3 -c`, and is
    // always present where these tests run.
    fn sh_executor(timeout_secs: u64) -> SubprocessExecutor {
        SubprocessExecutor::new(ExecutorSettings {
            interpreter: "sh".to_string(),
            timeout_secs,
            stdout_preview: 500,
            stderr_preview: 300,
        })
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let report = sh_executor(10).execute("printf 'hello\\n'").await;
        assert_eq!(report.stdout, "hello\n");
        assert_eq!(report.stderr, "");
        assert_eq!(
            report.outcome,
            ExecutionOutcome::Completed { exit_code: Some(0) }
        );
        assert!(!report.is_error());
    }

    #[tokio::test]
    async fn captures_stderr_and_nonzero_exit() {
        let report = sh_executor(10)
            .execute("printf partial; echo boom 1>&2; exit 3")
            .await;
        assert_eq!(report.stdout, "partial");
        assert_eq!(report.stderr, "boom\n");
        assert_eq!(
            report.outcome,
            ExecutionOutcome::Completed { exit_code: Some(3) }
        );
        assert!(report.is_error());
    }

    #[tokio::test]
    async fn timeout_returns_within_margin() {
        let started = Instant::now();
        let report = sh_executor(1).execute("sleep 30").await;
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "executor hung past its timeout"
        );
        assert_eq!(report.outcome, ExecutionOutcome::TimedOut { limit_secs: 1 });
        assert!(report.is_error());
    }

    #[tokio::test]
    async fn missing_interpreter_becomes_report() {
        let exec = SubprocessExecutor::new(ExecutorSettings {
            interpreter: "definitely-not-an-interpreter-7f3a".to_string(),
            ..ExecutorSettings::default()
        });
        let report = exec.execute("whatever").await;
        assert!(matches!(
            report.outcome,
            ExecutionOutcome::LaunchFailed { .. }
        ));
        assert!(report.is_error());
    }

    #[tokio::test]
    async fn long_output_is_truncated_with_marker() {
        let exec = SubprocessExecutor::new(ExecutorSettings {
            interpreter: "sh".to_string(),
            timeout_secs: 10,
            stdout_preview: 50,
            stderr_preview: 300,
        });
        let report = exec
            .execute("i=0; while [ $i -lt 20 ]; do printf 0123456789; i=$((i+1)); done")
            .await;
        assert!(report.stdout.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            report.stdout.chars().count(),
            50 + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn truncate_preview_respects_char_boundaries() {
        let (text, max) = ("ééééé", 3);
        let cut = truncate_preview(text, max);
        assert!(cut.starts_with("ééé"));
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncate_preview("short", 10), "short");
    }
}
