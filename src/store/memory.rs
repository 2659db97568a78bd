// src/store/memory.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::configuration::{BenchmarkConfiguration, ConfigurationUpdate, NewConfiguration};
use crate::errors::{BenchError, Result};
use crate::store::{ConfigurationStore, RoleStore, RunStore};
use crate::types::{ConfigId, Role, RunId, RunRecord, RunStatus, RunUpdate, UserId};

#[derive(Debug, Default)]
struct MemoryState {
    next_config_id: ConfigId,
    next_run_id: RunId,
    configs: HashMap<ConfigId, BenchmarkConfiguration>,
    runs: HashMap<RunId, RunRecord>,
    roles: HashMap<UserId, Role>,
}

/// In-process store with injectable write failures.
///
/// Two failure budgets: one for `running` updates, one for `completed` /
/// `failed` updates. While a budget is non-zero, a matching update returns
/// `StoreUnavailable` and consumes one unit of it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    running_write_failures: Arc<AtomicUsize>,
    terminal_write_failures: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` terminal writes.
    pub fn fail_terminal_writes(&self, count: usize) {
        self.terminal_write_failures.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` writes of `running`.
    pub fn fail_running_writes(&self, count: usize) {
        self.running_write_failures.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self, status: RunStatus) -> bool {
        let budget = if status.is_terminal() {
            &self.terminal_write_failures
        } else {
            &self.running_write_failures
        };
        budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| BenchError::StoreUnavailable("memory store lock poisoned".to_string()))
    }

    fn sorted_newest_first(mut runs: Vec<RunRecord>) -> Vec<RunRecord> {
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        runs
    }
}

impl RunStore for MemoryStore {
    fn create_run(&self, config_id: ConfigId, owner: UserId) -> Result<RunRecord> {
        let mut state = self.state()?;
        state.next_run_id += 1;
        let now = Utc::now();
        let run = RunRecord {
            id: state.next_run_id,
            config_id,
            user_id: owner,
            status: RunStatus::Pending,
            results: None,
            error_message: None,
            started_at: Some(now),
            completed_at: None,
            created_at: now,
        };
        state.runs.insert(run.id, run.clone());
        Ok(run)
    }

    fn update_run(&self, id: RunId, update: RunUpdate) -> Result<()> {
        if self.take_injected_failure(update.status) {
            return Err(BenchError::StoreUnavailable(format!(
                "injected failure writing {} for run {id}",
                update.status
            )));
        }

        let mut state = self.state()?;
        let run = state
            .runs
            .get_mut(&id)
            .ok_or_else(|| BenchError::run_not_found(id))?;

        run.status = update.status;
        if update.results.is_some() {
            run.results = update.results;
        }
        if update.error_message.is_some() {
            run.error_message = update.error_message;
        }
        if update.completed_at.is_some() {
            run.completed_at = update.completed_at;
        }
        Ok(())
    }

    fn get_run(&self, id: RunId) -> Result<Option<RunRecord>> {
        Ok(self.state()?.runs.get(&id).cloned())
    }

    fn list_runs_by_owner(&self, owner: UserId) -> Result<Vec<RunRecord>> {
        let state = self.state()?;
        let runs = state
            .runs
            .values()
            .filter(|r| r.user_id == owner)
            .cloned()
            .collect();
        Ok(Self::sorted_newest_first(runs))
    }

    fn list_runs_by_configuration(&self, config_id: ConfigId) -> Result<Vec<RunRecord>> {
        let state = self.state()?;
        let runs = state
            .runs
            .values()
            .filter(|r| r.config_id == config_id)
            .cloned()
            .collect();
        Ok(Self::sorted_newest_first(runs))
    }
}

impl ConfigurationStore for MemoryStore {
    fn create_configuration(
        &self,
        owner: UserId,
        config: &NewConfiguration,
    ) -> Result<BenchmarkConfiguration> {
        let mut state = self.state()?;
        state.next_config_id += 1;
        let now = Utc::now();
        let created = BenchmarkConfiguration {
            id: state.next_config_id,
            user_id: owner,
            name: config.name.clone(),
            api_url: config.api_url.clone(),
            timeout_secs: config.timeout_secs,
            num_samples: config.num_samples,
            tasks: config.tasks.clone(),
            created_at: now,
            updated_at: now,
        };
        state.configs.insert(created.id, created.clone());
        Ok(created)
    }

    fn get_configuration(&self, id: ConfigId) -> Result<Option<BenchmarkConfiguration>> {
        Ok(self.state()?.configs.get(&id).cloned())
    }

    fn list_configurations(&self, owner: UserId) -> Result<Vec<BenchmarkConfiguration>> {
        let state = self.state()?;
        let mut configs: Vec<_> = state
            .configs
            .values()
            .filter(|c| c.user_id == owner)
            .cloned()
            .collect();
        configs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(configs)
    }

    fn update_configuration(&self, id: ConfigId, update: &ConfigurationUpdate) -> Result<()> {
        let mut state = self.state()?;
        let config = state
            .configs
            .get_mut(&id)
            .ok_or_else(|| BenchError::configuration_not_found(id))?;
        update.apply_to(config, Utc::now());
        Ok(())
    }

    fn delete_configuration(&self, id: ConfigId) -> Result<()> {
        let mut state = self.state()?;
        state
            .configs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| BenchError::configuration_not_found(id))
    }
}

impl RoleStore for MemoryStore {
    fn assign_role(&self, user: UserId, role: Role) -> Result<()> {
        self.state()?.roles.insert(user, role);
        Ok(())
    }

    fn role_of(&self, user: UserId) -> Result<Option<Role>> {
        Ok(self.state()?.roles.get(&user).copied())
    }
}
