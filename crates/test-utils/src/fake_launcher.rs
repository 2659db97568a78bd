use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::{mpsc, Semaphore};
use benchrun::exec::{LaunchRequest, Launcher, ProcessEvent};

/// A fake launcher that:
/// - records every launch request
/// - replays a scripted event sequence per launch instead of spawning
///   anything.
///
/// Scripts queued with [`FakeLauncher::push_script`] are used in launch
/// order; once the queue is empty the default script is replayed.
///
/// With a gate, each launch emits its first event (normally `Started`) and
/// then waits for one gate permit before emitting the rest. This keeps runs
/// observably `running` until the test releases them.
pub struct FakeLauncher {
    default_script: Vec<ProcessEvent>,
    scripts: Mutex<VecDeque<Vec<ProcessEvent>>>,
    launched: Arc<Mutex<Vec<LaunchRequest>>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeLauncher {
    /// Every launch replays `script`.
    pub fn always(script: Vec<ProcessEvent>) -> Self {
        Self {
            default_script: script,
            scripts: Mutex::new(VecDeque::new()),
            launched: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    /// Every launch succeeds with `{"score": 1.0}`.
    pub fn succeeding() -> Self {
        Self::always(success_events(json!({ "score": 1.0 })))
    }

    /// Hold every launch after its first event until a gate permit is added.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Queue a script for the next launch that has no script yet.
    pub fn push_script(&self, script: Vec<ProcessEvent>) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn launched(&self) -> Vec<LaunchRequest> {
        self.launched.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().unwrap().len()
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, request: LaunchRequest) -> mpsc::Receiver<ProcessEvent> {
        self.launched.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_script.clone());
        let gate = self.gate.clone();

        let (tx, rx) = mpsc::channel(script.len().max(1));
        tokio::spawn(async move {
            let mut events = script.into_iter();
            if let Some(first) = events.next() {
                if tx.send(first).await.is_err() {
                    return;
                }
            }
            if let Some(gate) = gate {
                match gate.acquire().await {
                    Ok(permit) => permit.forget(),
                    Err(_) => return,
                }
            }
            for event in events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });
        rx
    }
}

/// Evaluator that prints `{"success": true, "results": payload}` and exits 0.
pub fn success_events(payload: Value) -> Vec<ProcessEvent> {
    stdout_events(&json!({ "success": true, "results": payload }).to_string(), 0)
}

/// Evaluator that prints `stdout` and exits with `code`.
pub fn stdout_events(stdout: &str, code: i32) -> Vec<ProcessEvent> {
    vec![
        ProcessEvent::Started { pid: Some(4242) },
        ProcessEvent::Stdout(stdout.as_bytes().to_vec()),
        ProcessEvent::Exited { code },
    ]
}

/// Evaluator that writes `stderr` and exits with `code`.
pub fn stderr_events(stderr: &str, code: i32) -> Vec<ProcessEvent> {
    vec![
        ProcessEvent::Started { pid: Some(4242) },
        ProcessEvent::Stderr(stderr.as_bytes().to_vec()),
        ProcessEvent::Exited { code },
    ]
}

/// Evaluator that could not be started.
pub fn launch_failure_events(reason: &str) -> Vec<ProcessEvent> {
    vec![ProcessEvent::LaunchFailed {
        reason: reason.to_string(),
    }]
}
