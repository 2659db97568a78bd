// src/engine/lifecycle.rs

//! Pure run lifecycle state machine.
//!
//! `RunLifecycle` is the authoritative record of which status a run is in
//! and which transitions it may still take. [`decide`] turns the way a
//! process ended, plus its captured output, into the terminal verdict.
//!
//! Nothing here touches Tokio, channels, processes or the store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::EvaluatorSection;
use crate::engine::interpret::{excerpt, interpret, Interpretation};
use crate::engine::FailureKind;
use crate::errors::{BenchError, Result};
use crate::types::{RunId, RunStatus, RunUpdate};

/// In-memory view of one run's status, advanced only along legal edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLifecycle {
    run_id: RunId,
    status: RunStatus,
}

impl RunLifecycle {
    /// A freshly created run.
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            status: RunStatus::Pending,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Fail unless `next` is reachable from the current status.
    pub fn check(&self, next: RunStatus) -> Result<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(BenchError::InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }

    /// Move to `next`. Call only once `next` is durably stored.
    pub fn advance(&mut self, next: RunStatus) -> Result<()> {
        self.check(next)?;
        self.status = next;
        Ok(())
    }
}

/// How the evaluator process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessTermination {
    Exited { code: i32 },
    LaunchFailed { reason: String },
    TimedOut { limit: Duration },
    /// The event stream closed without a terminal event.
    StreamClosed,
}

/// Append-only capture of the evaluator's output.
///
/// Bytes are kept raw and decoded once at the end, so multi-byte characters
/// split across chunks survive.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl CapturedOutput {
    pub fn push_stdout(&mut self, chunk: &[u8]) {
        self.stdout.extend_from_slice(chunk);
    }

    pub fn push_stderr(&mut self, chunk: &[u8]) {
        self.stderr.extend_from_slice(chunk);
    }

    pub fn stdout_len(&self) -> usize {
        self.stdout.len()
    }

    pub fn stderr_len(&self) -> usize {
        self.stderr.len()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Bounds on how much captured output ends up in stored error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExcerptLimits {
    pub stderr_chars: usize,
    pub stdout_chars: usize,
}

impl Default for ExcerptLimits {
    fn default() -> Self {
        Self {
            stderr_chars: 1000,
            stdout_chars: 500,
        }
    }
}

impl From<&EvaluatorSection> for ExcerptLimits {
    fn from(evaluator: &EvaluatorSection) -> Self {
        Self {
            stderr_chars: evaluator.stderr_excerpt_chars,
            stdout_chars: evaluator.stdout_excerpt_chars,
        }
    }
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunVerdict {
    Completed { payload: Value },
    Failed { kind: FailureKind, message: String },
}

impl RunVerdict {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        RunVerdict::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn status(&self) -> RunStatus {
        match self {
            RunVerdict::Completed { .. } => RunStatus::Completed,
            RunVerdict::Failed { .. } => RunStatus::Failed,
        }
    }

    /// Store update for this verdict. Exactly one of payload / error text is
    /// set, and the completion time always is.
    pub fn into_update(self, at: DateTime<Utc>) -> RunUpdate {
        match self {
            RunVerdict::Completed { payload } => RunUpdate::completed(payload, at),
            RunVerdict::Failed { message, .. } => RunUpdate::failed(message, at),
        }
    }
}

/// Apply the termination rules, in order:
///
/// 1. launch failure → failed with the launch diagnostic
/// 2. non-zero exit → failed with a stderr excerpt, or a generic message
///    naming the code when stderr is blank
/// 3. exit 0 with blank stdout → failed
/// 4. exit 0 with output → the interpreter decides
pub fn decide(
    termination: &ProcessTermination,
    output: &CapturedOutput,
    limits: &ExcerptLimits,
) -> RunVerdict {
    match termination {
        ProcessTermination::LaunchFailed { reason } => RunVerdict::failed(
            FailureKind::LaunchFailure,
            format!("Failed to start benchmark process: {reason}"),
        ),
        ProcessTermination::StreamClosed => RunVerdict::failed(
            FailureKind::LaunchFailure,
            "Benchmark process ended without reporting an exit status",
        ),
        ProcessTermination::TimedOut { limit } => RunVerdict::failed(
            FailureKind::TimedOut,
            format!(
                "Benchmark exceeded wall-clock limit of {}s",
                limit.as_secs()
            ),
        ),
        ProcessTermination::Exited { code } if *code != 0 => {
            let stderr = output.stderr_text();
            let message = if stderr.trim().is_empty() {
                format!("Process exited with code {code}")
            } else {
                excerpt(&stderr, limits.stderr_chars)
            };
            RunVerdict::failed(FailureKind::NonZeroExit, message)
        }
        ProcessTermination::Exited { .. } => {
            let stdout = output.stdout_text();
            if stdout.trim().is_empty() {
                return RunVerdict::failed(
                    FailureKind::EmptyOutput,
                    "Process exited with code 0 but produced no output",
                );
            }
            match interpret(&stdout, limits.stdout_chars) {
                Interpretation::Success { payload } => RunVerdict::Completed { payload },
                Interpretation::Failure { kind, reason } => RunVerdict::failed(kind, reason),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(stdout: &str, stderr: &str) -> CapturedOutput {
        let mut out = CapturedOutput::default();
        out.push_stdout(stdout.as_bytes());
        out.push_stderr(stderr.as_bytes());
        out
    }

    #[test]
    fn lifecycle_walks_happy_path() {
        let mut lc = RunLifecycle::new(1);
        assert_eq!(lc.status(), RunStatus::Pending);
        lc.advance(RunStatus::Running).unwrap();
        lc.advance(RunStatus::Completed).unwrap();
        assert_eq!(lc.status(), RunStatus::Completed);
    }

    #[test]
    fn lifecycle_rejects_leaving_terminal_state() {
        let mut lc = RunLifecycle::new(1);
        lc.advance(RunStatus::Running).unwrap();
        lc.advance(RunStatus::Failed).unwrap();
        match lc.advance(RunStatus::Completed) {
            Err(BenchError::InvalidTransition { from, to }) => {
                assert_eq!(from, RunStatus::Failed);
                assert_eq!(to, RunStatus::Completed);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
        assert_eq!(lc.status(), RunStatus::Failed);
    }

    #[test]
    fn launch_failure_carries_diagnostic() {
        let verdict = decide(
            &ProcessTermination::LaunchFailed {
                reason: "No such file or directory (os error 2)".to_string(),
            },
            &CapturedOutput::default(),
            &ExcerptLimits::default(),
        );
        assert_eq!(
            verdict,
            RunVerdict::failed(
                FailureKind::LaunchFailure,
                "Failed to start benchmark process: No such file or directory (os error 2)"
            )
        );
    }

    #[test]
    fn non_zero_exit_prefers_stderr() {
        let verdict = decide(
            &ProcessTermination::Exited { code: 1 },
            &output("", "connection refused"),
            &ExcerptLimits::default(),
        );
        assert_eq!(
            verdict,
            RunVerdict::failed(FailureKind::NonZeroExit, "connection refused")
        );
    }

    #[test]
    fn non_zero_exit_ignores_stdout_even_if_successful() {
        let verdict = decide(
            &ProcessTermination::Exited { code: 2 },
            &output(r#"{"success": true, "results": {}}"#, "  \n"),
            &ExcerptLimits::default(),
        );
        assert_eq!(
            verdict,
            RunVerdict::failed(FailureKind::NonZeroExit, "Process exited with code 2")
        );
    }

    #[test]
    fn stderr_excerpt_is_truncated() {
        let limits = ExcerptLimits {
            stderr_chars: 10,
            stdout_chars: 500,
        };
        let verdict = decide(
            &ProcessTermination::Exited { code: 1 },
            &output("", &"x".repeat(50)),
            &limits,
        );
        match verdict {
            RunVerdict::Failed { message, .. } => assert_eq!(message.len(), 10),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn blank_stdout_with_clean_exit_fails() {
        let verdict = decide(
            &ProcessTermination::Exited { code: 0 },
            &output(" \n\t", "some warnings"),
            &ExcerptLimits::default(),
        );
        match verdict {
            RunVerdict::Failed { kind, .. } => assert_eq!(kind, FailureKind::EmptyOutput),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn clean_exit_with_document_is_interpreted() {
        let verdict = decide(
            &ProcessTermination::Exited { code: 0 },
            &output(r#"{"success": true, "results": {"arc_easy": {"acc": 0.7}}}"#, ""),
            &ExcerptLimits::default(),
        );
        assert_eq!(
            verdict,
            RunVerdict::Completed {
                payload: json!({"arc_easy": {"acc": 0.7}})
            }
        );
    }

    #[test]
    fn timeout_names_the_limit() {
        let verdict = decide(
            &ProcessTermination::TimedOut {
                limit: Duration::from_secs(90),
            },
            &CapturedOutput::default(),
            &ExcerptLimits::default(),
        );
        assert_eq!(
            verdict,
            RunVerdict::failed(
                FailureKind::TimedOut,
                "Benchmark exceeded wall-clock limit of 90s"
            )
        );
    }

    #[test]
    fn verdict_update_sets_exactly_one_of_payload_or_error() {
        let at = Utc::now();
        let done = RunVerdict::Completed { payload: json!({}) }.into_update(at);
        assert!(done.results.is_some() && done.error_message.is_none());
        assert_eq!(done.completed_at, Some(at));

        let failed = RunVerdict::failed(FailureKind::NonZeroExit, "x").into_update(at);
        assert!(failed.results.is_none() && failed.error_message.is_some());
        assert_eq!(failed.completed_at, Some(at));
    }
}
