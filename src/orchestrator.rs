// src/orchestrator.rs

//! Orchestrator facade: the single entry point outer collaborators call.
//!
//! `submit_run` validates ownership, creates the run record, and hands the
//! rest of the run to a detached Tokio task before returning. Everything
//! after that is observed by polling `get_run`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::config::{EvaluatorSection, Settings};
use crate::configuration::{BenchmarkConfiguration, ConfigurationUpdate, NewConfiguration};
use crate::engine::admission::Admission;
use crate::engine::driver::{finish_run, mark_running, RunTask};
use crate::engine::{ExcerptLimits, FailureKind, RunLifecycle, RunVerdict};
use crate::errors::{BenchError, Result};
use crate::exec::{build_evaluator_command, LaunchRequest, Launcher};
use crate::store::{self, ConfigurationStore, RoleStore, RunStore, Store};
use crate::types::{ConfigId, Role, RunId, RunRecord, UserId};

pub struct Orchestrator {
    configs: Arc<dyn ConfigurationStore>,
    runs: Arc<dyn RunStore>,
    roles: Arc<dyn RoleStore>,
    launcher: Arc<dyn Launcher>,
    evaluator: EvaluatorSection,
    admission: Admission,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("evaluator", &self.evaluator)
            .field("admission", &self.admission)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new<S>(store: Arc<S>, launcher: Arc<dyn Launcher>, settings: &Settings) -> Self
    where
        S: Store + 'static,
    {
        Self {
            configs: store.clone(),
            runs: store.clone(),
            roles: store,
            launcher,
            evaluator: settings.evaluator.clone(),
            admission: Admission::new(settings.admission.max_concurrent_runs),
        }
    }

    /// Schedule a run of `config_id` for `caller` and return its id.
    ///
    /// Never waits for the evaluator. When an admission slot is free the run
    /// is already `running` on return; otherwise it stays `pending` until a
    /// slot opens.
    pub async fn submit_run(&self, config_id: ConfigId, caller: UserId) -> Result<RunId> {
        let config = self.owned_configuration(config_id, caller).await?;

        let record = store::blocking(&self.runs, move |s| s.create_run(config_id, caller)).await?;
        let run_id = record.id;
        let mut lifecycle = RunLifecycle::new(run_id);

        let request = LaunchRequest {
            run_id,
            command: build_evaluator_command(&self.evaluator, &config),
            max_runtime: self.evaluator.max_runtime(),
        };

        match self.admission.try_admit() {
            Some(permit) => {
                if let Err(err) = mark_running(&mut lifecycle, &self.runs).await {
                    error!(run_id, error = %err, "failed to mark run as running");
                    let verdict = RunVerdict::failed(
                        FailureKind::LaunchFailure,
                        format!("Error starting benchmark: {err}"),
                    );
                    if let Err(close_err) = finish_run(&mut lifecycle, &self.runs, verdict).await {
                        error!(run_id, error = %close_err, "run could not be closed out");
                    }
                    return Err(err);
                }
                let task = self.run_task(lifecycle, request);
                tokio::spawn(task.execute(permit));
            }
            None => {
                info!(run_id, "admission pool full; run queued");
                let task = self.run_task(lifecycle, request);
                let admission = self.admission.clone();
                tokio::spawn(async move {
                    let permit = admission.admit().await;
                    task.execute(permit).await;
                });
            }
        }

        info!(run_id, config_id, caller, "benchmark started in background");
        Ok(run_id)
    }

    /// Current snapshot of a run owned by `caller`.
    pub async fn get_run(&self, run_id: RunId, caller: UserId) -> Result<RunRecord> {
        let record = store::blocking(&self.runs, move |s| s.get_run(run_id)).await?;
        match record {
            Some(record) if record.user_id == caller => Ok(record),
            _ => Err(BenchError::run_not_found(run_id)),
        }
    }

    /// Poll `get_run` until the run is terminal.
    pub async fn wait_for_terminal(
        &self,
        run_id: RunId,
        caller: UserId,
        poll_interval: Duration,
    ) -> Result<RunRecord> {
        loop {
            let record = self.get_run(run_id, caller).await?;
            if record.is_terminal() {
                return Ok(record);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// All runs of `caller`, newest first.
    pub async fn list_runs(&self, caller: UserId) -> Result<Vec<RunRecord>> {
        store::blocking(&self.runs, move |s| s.list_runs_by_owner(caller)).await
    }

    /// Runs of one configuration owned by `caller`, newest first.
    pub async fn list_runs_for_configuration(
        &self,
        config_id: ConfigId,
        caller: UserId,
    ) -> Result<Vec<RunRecord>> {
        self.owned_configuration(config_id, caller).await?;
        store::blocking(&self.runs, move |s| s.list_runs_by_configuration(config_id)).await
    }

    pub async fn create_configuration(
        &self,
        caller: UserId,
        config: NewConfiguration,
    ) -> Result<BenchmarkConfiguration> {
        config.validate()?;
        let created =
            store::blocking(&self.configs, move |s| s.create_configuration(caller, &config))
                .await?;
        info!(config_id = created.id, caller, "benchmark configuration created");
        Ok(created)
    }

    pub async fn get_configuration(
        &self,
        config_id: ConfigId,
        caller: UserId,
    ) -> Result<BenchmarkConfiguration> {
        self.owned_configuration(config_id, caller).await
    }

    pub async fn list_configurations(&self, caller: UserId) -> Result<Vec<BenchmarkConfiguration>> {
        store::blocking(&self.configs, move |s| s.list_configurations(caller)).await
    }

    pub async fn update_configuration(
        &self,
        config_id: ConfigId,
        caller: UserId,
        update: ConfigurationUpdate,
    ) -> Result<BenchmarkConfiguration> {
        update.validate()?;
        self.owned_configuration(config_id, caller).await?;
        if !update.is_empty() {
            store::blocking(&self.configs, move |s| {
                s.update_configuration(config_id, &update)
            })
            .await?;
        }
        self.owned_configuration(config_id, caller).await
    }

    /// Delete a configuration. Runs referencing it are kept.
    pub async fn delete_configuration(&self, config_id: ConfigId, caller: UserId) -> Result<()> {
        self.owned_configuration(config_id, caller).await?;
        store::blocking(&self.configs, move |s| s.delete_configuration(config_id)).await?;
        info!(config_id, caller, "benchmark configuration deleted");
        Ok(())
    }

    /// Role of `caller`; users without an assignment are plain users.
    pub async fn role_of(&self, caller: UserId) -> Result<Role> {
        let role = store::blocking(&self.roles, move |s| s.role_of(caller)).await?;
        Ok(role.unwrap_or_default())
    }

    async fn owned_configuration(
        &self,
        config_id: ConfigId,
        caller: UserId,
    ) -> Result<BenchmarkConfiguration> {
        let config = store::blocking(&self.configs, move |s| s.get_configuration(config_id)).await?;
        match config {
            Some(config) if config.is_owned_by(caller) => Ok(config),
            _ => Err(BenchError::configuration_not_found(config_id)),
        }
    }

    fn run_task(&self, lifecycle: RunLifecycle, request: LaunchRequest) -> RunTask {
        RunTask {
            lifecycle,
            runs: Arc::clone(&self.runs),
            launcher: Arc::clone(&self.launcher),
            limits: ExcerptLimits::from(&self.evaluator),
            request,
        }
    }
}
