// src/engine/driver.rs

//! Async shell around the run lifecycle.
//!
//! One [`RunDriver`] per run consumes that run's launcher events, feeds the
//! captured output into [`decide`], and writes the terminal state. It owns no
//! reference back to the request that created the run.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::admission::AdmissionPermit;
use crate::engine::lifecycle::{
    decide, CapturedOutput, ExcerptLimits, ProcessTermination, RunLifecycle, RunVerdict,
};
use crate::engine::FailureKind;
use crate::errors::Result;
use crate::exec::{LaunchRequest, Launcher, ProcessEvent};
use crate::store::{self, RunStore};
use crate::types::{RunStatus, RunUpdate};

/// Drives one launched run from its event stream to a terminal store write.
pub struct RunDriver {
    lifecycle: RunLifecycle,
    runs: Arc<dyn RunStore>,
    limits: ExcerptLimits,
    events: mpsc::Receiver<ProcessEvent>,
}

impl RunDriver {
    pub fn new(
        lifecycle: RunLifecycle,
        runs: Arc<dyn RunStore>,
        limits: ExcerptLimits,
        events: mpsc::Receiver<ProcessEvent>,
    ) -> Self {
        Self {
            lifecycle,
            runs,
            limits,
            events,
        }
    }

    /// Consume events until the terminal one, then persist the verdict.
    ///
    /// Returns the status actually stored.
    pub async fn run(mut self) -> Result<RunStatus> {
        let run_id = self.lifecycle.run_id();
        let mut output = CapturedOutput::default();

        let termination = loop {
            let Some(event) = self.events.recv().await else {
                warn!(run_id, "evaluator event stream closed without a terminal event");
                break ProcessTermination::StreamClosed;
            };

            match event {
                ProcessEvent::Started { pid } => {
                    debug!(run_id, ?pid, "evaluator started");
                }
                ProcessEvent::Stdout(chunk) => output.push_stdout(&chunk),
                ProcessEvent::Stderr(chunk) => {
                    for line in String::from_utf8_lossy(&chunk).lines() {
                        debug!(run_id, "stderr: {}", line);
                    }
                    output.push_stderr(&chunk);
                }
                ProcessEvent::Exited { code } => break ProcessTermination::Exited { code },
                ProcessEvent::LaunchFailed { reason } => {
                    break ProcessTermination::LaunchFailed { reason };
                }
                ProcessEvent::TimedOut { limit } => break ProcessTermination::TimedOut { limit },
            }
        };

        info!(
            run_id,
            ?termination,
            stdout_bytes = output.stdout_len(),
            stderr_bytes = output.stderr_len(),
            "evaluator finished"
        );

        let verdict = decide(&termination, &output, &self.limits);
        finish_run(&mut self.lifecycle, &self.runs, verdict).await
    }
}

/// Persist `running` and advance the lifecycle.
pub async fn mark_running(lifecycle: &mut RunLifecycle, runs: &Arc<dyn RunStore>) -> Result<()> {
    let run_id = lifecycle.run_id();
    lifecycle.check(RunStatus::Running)?;
    store::blocking(runs, move |s| s.update_run(run_id, RunUpdate::running())).await?;
    lifecycle.advance(RunStatus::Running)?;
    debug!(run_id, "run marked running");
    Ok(())
}

/// Write the terminal verdict.
///
/// If that write fails, a second write records `failed` with the store
/// error. If the second write also fails the run stays non-terminal and the
/// error is returned.
pub async fn finish_run(
    lifecycle: &mut RunLifecycle,
    runs: &Arc<dyn RunStore>,
    verdict: RunVerdict,
) -> Result<RunStatus> {
    let run_id = lifecycle.run_id();
    let status = verdict.status();
    lifecycle.check(status)?;

    match &verdict {
        RunVerdict::Completed { .. } => info!(run_id, "benchmark completed successfully"),
        RunVerdict::Failed { kind, message } => {
            warn!(run_id, ?kind, error = %message, "benchmark failed");
        }
    }

    let update = verdict.into_update(Utc::now());
    let first = store::blocking(runs, move |s| s.update_run(run_id, update)).await;
    let err = match first {
        Ok(()) => {
            lifecycle.advance(status)?;
            return Ok(status);
        }
        Err(err) => err,
    };

    error!(run_id, error = %err, "failed to persist terminal run state");
    let fallback = RunUpdate::failed(format!("Error processing results: {err}"), Utc::now());
    match store::blocking(runs, move |s| s.update_run(run_id, fallback)).await {
        Ok(()) => {
            lifecycle.advance(RunStatus::Failed)?;
            Ok(RunStatus::Failed)
        }
        Err(second) => {
            error!(
                run_id,
                error = %second,
                "failed to record run failure; run left in a non-terminal state"
            );
            Err(second)
        }
    }
}

/// A scheduled run, detached from the request that created it.
pub(crate) struct RunTask {
    pub lifecycle: RunLifecycle,
    pub runs: Arc<dyn RunStore>,
    pub launcher: Arc<dyn Launcher>,
    pub limits: ExcerptLimits,
    pub request: LaunchRequest,
}

impl RunTask {
    /// Mark running if still queued, launch, and drive to completion.
    ///
    /// `_permit` holds the admission slot until the terminal write is done.
    pub(crate) async fn execute(self, _permit: AdmissionPermit) {
        let RunTask {
            mut lifecycle,
            runs,
            launcher,
            limits,
            request,
        } = self;
        let run_id = lifecycle.run_id();

        if lifecycle.status() == RunStatus::Pending {
            if let Err(err) = mark_running(&mut lifecycle, &runs).await {
                error!(run_id, error = %err, "failed to mark queued run as running");
                let verdict = RunVerdict::failed(
                    FailureKind::LaunchFailure,
                    format!("Error starting benchmark: {err}"),
                );
                if let Err(err) = finish_run(&mut lifecycle, &runs, verdict).await {
                    error!(run_id, error = %err, "queued run could not be closed out");
                }
                return;
            }
        }

        let events = launcher.launch(request);
        match RunDriver::new(lifecycle, runs, limits, events).run().await {
            Ok(status) => debug!(run_id, %status, "run finished"),
            Err(err) => error!(run_id, error = %err, "run driver error"),
        }
    }
}
