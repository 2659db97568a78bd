// src/exec/process.rs

//! Real evaluator process launcher.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::exec::backend::{LaunchRequest, Launcher, ProcessEvent};

const EVENT_BUFFER: usize = 64;
const READ_CHUNK: usize = 8 * 1024;

/// Spawns the evaluator with `tokio::process` and streams its output.
///
/// No concurrency limit is applied here; admission control sits in front of
/// the launcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, request: LaunchRequest) -> mpsc::Receiver<ProcessEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(run_evaluator(request, tx));
        rx
    }
}

/// Run a single evaluator process to completion.
///
/// Errors after a successful spawn (e.g. `wait` failing) are reported as an
/// exit with code `-1`, so the stream still ends with a terminal event.
async fn run_evaluator(request: LaunchRequest, events: mpsc::Sender<ProcessEvent>) {
    let run_id = request.run_id;
    if let Err(err) = run_evaluator_inner(request, &events).await {
        error!(run_id, error = %format!("{err:#}"), "evaluator execution error");
        let _ = events.send(ProcessEvent::Exited { code: -1 }).await;
    }
}

async fn run_evaluator_inner(
    request: LaunchRequest,
    events: &mpsc::Sender<ProcessEvent>,
) -> Result<()> {
    let run_id = request.run_id;
    info!(run_id, cmd = %request.command.display(), "starting evaluator process");

    let mut cmd = Command::new(&request.command.program);
    cmd.args(&request.command.args)
        .envs(&request.command.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(run_id, error = %err, "failed to spawn evaluator process");
            events
                .send(ProcessEvent::LaunchFailed {
                    reason: err.to_string(),
                })
                .await
                .context("sending LaunchFailed event")?;
            return Ok(());
        }
    };

    let pid = child.id();
    debug!(run_id, ?pid, "evaluator process spawned");
    events
        .send(ProcessEvent::Started { pid })
        .await
        .context("sending Started event")?;

    let stdout_reader = child
        .stdout
        .take()
        .map(|out| spawn_reader(out, events.clone(), ProcessEvent::Stdout));
    let stderr_reader = child
        .stderr
        .take()
        .map(|err| spawn_reader(err, events.clone(), ProcessEvent::Stderr));

    let readers: Vec<JoinHandle<()>> = [stdout_reader, stderr_reader]
        .into_iter()
        .flatten()
        .collect();
    let abort_handles: Vec<_> = readers.iter().map(JoinHandle::abort_handle).collect();

    // One deadline covers both the process and the drain of its pipes: a
    // background grandchild can keep a pipe open after the evaluator exits.
    let limit_timer = deadline(request.max_runtime);
    tokio::pin!(limit_timer);

    let status = tokio::select! {
        status_res = child.wait() => status_res
            .with_context(|| format!("waiting for evaluator process of run {run_id}"))?,

        limit = &mut limit_timer => {
            warn!(run_id, limit_secs = limit.as_secs(), "evaluator exceeded wall-clock limit; killing process");
            if let Err(e) = child.kill().await {
                warn!(run_id, error = %e, "failed to kill evaluator process");
            }
            return send_timed_out(events, &abort_handles, limit).await;
        }
    };

    tokio::select! {
        _ = drain_readers(readers, run_id) => {}
        limit = &mut limit_timer => {
            warn!(run_id, limit_secs = limit.as_secs(), "evaluator output still open at wall-clock limit");
            return send_timed_out(events, &abort_handles, limit).await;
        }
    }

    let code = status.code().unwrap_or(-1);
    info!(run_id, exit_code = code, success = status.success(), "evaluator process exited");

    events
        .send(ProcessEvent::Exited { code })
        .await
        .context("sending Exited event")?;

    Ok(())
}

/// Resolves after `limit`, or never when there is no limit.
async fn deadline(limit: Option<Duration>) -> Duration {
    match limit {
        Some(limit) => {
            tokio::time::sleep(limit).await;
            limit
        }
        None => std::future::pending().await,
    }
}

/// Forward raw chunks from one pipe until EOF.
fn spawn_reader<R>(
    mut pipe: R,
    events: mpsc::Sender<ProcessEvent>,
    wrap: fn(Vec<u8>) -> ProcessEvent,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if events.send(wrap(buf[..n].to_vec())).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "evaluator pipe read failed");
                    break;
                }
            }
        }
    })
}

/// Wait for every pipe reader to reach EOF.
async fn drain_readers(readers: Vec<JoinHandle<()>>, run_id: i64) {
    for reader in readers {
        if let Err(e) = reader.await {
            debug!(run_id, error = %e, "evaluator pipe reader ended abnormally");
        }
    }
}

/// Stop forwarding output and report the timeout as the terminal event.
async fn send_timed_out(
    events: &mpsc::Sender<ProcessEvent>,
    readers: &[AbortHandle],
    limit: Duration,
) -> Result<()> {
    for reader in readers {
        reader.abort();
    }
    events
        .send(ProcessEvent::TimedOut { limit })
        .await
        .context("sending TimedOut event")
}
