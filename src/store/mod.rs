// src/store/mod.rs

//! Durable storage for configurations, run records and role assignments.
//!
//! The orchestrator only talks to the traits defined here; the concrete
//! backend is chosen once at startup and injected as a trait object.
//!
//! - [`sqlite`] is the production backend (`rusqlite`).
//! - [`memory`] is an in-process backend with failure injection, used by
//!   tests that need to exercise persistence failures.
//!
//! The traits are synchronous. Async callers go through [`blocking`], which
//! moves the call onto Tokio's blocking pool.

use std::fmt::Debug;
use std::sync::Arc;

use crate::configuration::{BenchmarkConfiguration, ConfigurationUpdate, NewConfiguration};
use crate::errors::{BenchError, Result};
use crate::types::{ConfigId, Role, RunId, RunRecord, RunUpdate, UserId};

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Durable table of run attempts.
///
/// The store applies updates as given; enforcing the one-directional
/// lifecycle is the caller's job.
pub trait RunStore: Send + Sync + Debug {
    /// Insert a new record in `pending` with `started_at = created_at = now`.
    fn create_run(&self, config_id: ConfigId, owner: UserId) -> Result<RunRecord>;

    /// Partial update. Fails with `NotFound` if the run does not exist.
    fn update_run(&self, id: RunId, update: RunUpdate) -> Result<()>;

    fn get_run(&self, id: RunId) -> Result<Option<RunRecord>>;

    /// All runs of `owner`, newest first.
    fn list_runs_by_owner(&self, owner: UserId) -> Result<Vec<RunRecord>>;

    /// All runs of one configuration, newest first.
    fn list_runs_by_configuration(&self, config_id: ConfigId) -> Result<Vec<RunRecord>>;
}

/// Configuration provider backing the orchestrator.
pub trait ConfigurationStore: Send + Sync + Debug {
    fn create_configuration(
        &self,
        owner: UserId,
        config: &NewConfiguration,
    ) -> Result<BenchmarkConfiguration>;

    fn get_configuration(&self, id: ConfigId) -> Result<Option<BenchmarkConfiguration>>;

    /// All configurations of `owner`, newest first.
    fn list_configurations(&self, owner: UserId) -> Result<Vec<BenchmarkConfiguration>>;

    fn update_configuration(&self, id: ConfigId, update: &ConfigurationUpdate) -> Result<()>;

    fn delete_configuration(&self, id: ConfigId) -> Result<()>;
}

/// Explicit role assignments, seeded at provisioning time.
pub trait RoleStore: Send + Sync + Debug {
    fn assign_role(&self, user: UserId, role: Role) -> Result<()>;

    fn role_of(&self, user: UserId) -> Result<Option<Role>>;
}

/// Everything the orchestrator needs from one backend.
pub trait Store: RunStore + ConfigurationStore + RoleStore {}

impl<T: RunStore + ConfigurationStore + RoleStore> Store for T {}

/// Run a synchronous store call on Tokio's blocking pool.
pub async fn blocking<S, T, F>(store: &Arc<S>, f: F) -> Result<T>
where
    S: ?Sized + Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| BenchError::StoreUnavailable(format!("store call did not complete: {e}")))?
}
