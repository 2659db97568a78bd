// src/exec/backend.rs

//! Pluggable launcher abstraction.
//!
//! The orchestrator talks to a `Launcher` instead of spawning processes
//! itself. Each launch returns its own event stream, so concurrent runs never
//! share a channel.
//!
//! Every stream ends with exactly one terminal event (`Exited`,
//! `LaunchFailed` or `TimedOut`), sent only after all output produced by the
//! process has been delivered.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::exec::command::EvaluatorCommand;
use crate::types::RunId;

/// Everything needed to start one evaluator process.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    pub run_id: RunId,
    pub command: EvaluatorCommand,
    /// Kill the process after this long; `None` lets it run indefinitely.
    pub max_runtime: Option<Duration>,
}

/// Lifecycle and output events of one evaluator process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// The process was spawned.
    Started { pid: Option<u32> },
    /// A chunk of standard output, in arrival order.
    Stdout(Vec<u8>),
    /// A chunk of standard error. Diagnostic only.
    Stderr(Vec<u8>),
    /// The process exited. Signals map to `-1`.
    Exited { code: i32 },
    /// The process could not be started at all.
    LaunchFailed { reason: String },
    /// The process was killed after exceeding its wall-clock limit.
    TimedOut { limit: Duration },
}

impl ProcessEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessEvent::Exited { .. }
                | ProcessEvent::LaunchFailed { .. }
                | ProcessEvent::TimedOut { .. }
        )
    }
}

/// Trait abstracting how evaluator processes are started.
///
/// Production code uses [`super::ProcessLauncher`]; tests can provide their
/// own implementation that doesn't spawn real processes.
pub trait Launcher: Send + Sync {
    /// Start one evaluator and return its event stream.
    ///
    /// Must be called from within a Tokio runtime. Must not block.
    fn launch(&self, request: LaunchRequest) -> mpsc::Receiver<ProcessEvent>;
}
