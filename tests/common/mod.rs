#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use benchrun::config::Settings;
use benchrun::orchestrator::Orchestrator;
use benchrun::store::{MemoryStore, SqliteStore};
use benchrun::types::{ConfigId, RunId, RunRecord, RunStatus, UserId};
use benchrun_test_utils::builders::{ConfigurationBuilder, SettingsBuilder};
use benchrun_test_utils::fake_launcher::FakeLauncher;
use benchrun_test_utils::with_timeout;

pub const OWNER: UserId = 1;
pub const STRANGER: UserId = 2;
pub const POLL: Duration = Duration::from_millis(5);

/// Orchestrator wired to an in-memory store and a fake launcher.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub store: Arc<MemoryStore>,
    pub launcher: Arc<FakeLauncher>,
}

impl Harness {
    pub fn new(launcher: FakeLauncher) -> Self {
        Self::with_settings(launcher, &SettingsBuilder::new().build())
    }

    pub fn with_settings(launcher: FakeLauncher, settings: &Settings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let launcher = Arc::new(launcher);
        let orchestrator = Orchestrator::new(Arc::clone(&store), launcher.clone(), settings);
        Self {
            orchestrator,
            store,
            launcher,
        }
    }

    /// Create a valid configuration owned by `owner`.
    pub async fn seed_configuration(&self, owner: UserId) -> ConfigId {
        self.orchestrator
            .create_configuration(owner, ConfigurationBuilder::new().build())
            .await
            .expect("seed configuration")
            .id
    }

    pub async fn run_to_completion(&self, config_id: ConfigId) -> RunRecord {
        let run_id = self
            .orchestrator
            .submit_run(config_id, OWNER)
            .await
            .expect("submit run");
        wait_terminal(&self.orchestrator, run_id).await
    }
}

/// Orchestrator wired to a fresh sqlite store.
pub fn sqlite_orchestrator(
    launcher: Arc<dyn benchrun::exec::Launcher>,
    settings: &Settings,
) -> (Orchestrator, Arc<SqliteStore>) {
    let store = Arc::new(benchrun::open_store(&settings.store).expect("open sqlite store"));
    let orchestrator = Orchestrator::new(Arc::clone(&store), launcher, settings);
    (orchestrator, store)
}

pub async fn wait_terminal(orchestrator: &Orchestrator, run_id: RunId) -> RunRecord {
    with_timeout(orchestrator.wait_for_terminal(run_id, OWNER, POLL))
        .await
        .expect("run lookup")
}

pub async fn wait_status(orchestrator: &Orchestrator, run_id: RunId, status: RunStatus) {
    with_timeout(async {
        loop {
            let record = orchestrator.get_run(run_id, OWNER).await.expect("run lookup");
            if record.status == status {
                return;
            }
            tokio::time::sleep(POLL).await;
        }
    })
    .await
}

/// Poll a synchronous condition until it holds.
pub async fn eventually<F: FnMut() -> bool>(mut cond: F) {
    with_timeout(async {
        while !cond() {
            tokio::time::sleep(POLL).await;
        }
    })
    .await
}
