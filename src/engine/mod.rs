// src/engine/mod.rs

//! Run orchestration engine.
//!
//! This module ties together:
//! - the output interpreter (stdout document → verdict)
//! - the run lifecycle state machine (which status a run may move to, and
//!   which terminal verdict a finished process produces)
//! - the per-run driver that consumes launcher events and writes the store
//! - admission control in front of the launcher
//!
//! [`interpret`] and [`lifecycle`] are pure and synchronous; the async/IO
//! shell lives in [`driver`] and [`admission`].

use serde::Serialize;

pub mod admission;
pub mod driver;
pub mod interpret;
pub mod lifecycle;

pub use admission::{Admission, AdmissionPermit};
pub use driver::RunDriver;
pub use interpret::{interpret, Interpretation};
pub use lifecycle::{
    decide, CapturedOutput, ExcerptLimits, ProcessTermination, RunLifecycle, RunVerdict,
};

/// Why a run ended in `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The evaluator could not be started.
    LaunchFailure,
    /// The evaluator exited with a non-zero code.
    NonZeroExit,
    /// Exit code 0 but nothing on stdout.
    EmptyOutput,
    /// Stdout was not a single JSON document.
    MalformedOutput,
    /// The document reported `success: false` (or no results).
    InBandEvaluationFailure,
    /// The evaluator was killed after its wall-clock limit.
    TimedOut,
}
