// src/lib.rs

pub mod cli;
pub mod commands;
pub mod config;
pub mod configuration;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod orchestrator;
pub mod provision;
pub mod store;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_or_default, StoreSection};
use crate::exec::ProcessLauncher;
use crate::orchestrator::Orchestrator;
use crate::store::SqliteStore;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading
/// - the sqlite store
/// - the process launcher and orchestrator
/// - subcommand dispatch
pub async fn run(args: CliArgs) -> Result<()> {
    let settings = load_or_default(args.settings.as_deref())?;
    debug!(?settings, "settings loaded");

    let store = Arc::new(open_store(&settings.store)?);
    info!(path = %settings.store.path, "run store ready");

    let launcher = Arc::new(ProcessLauncher::new());
    let orchestrator = Orchestrator::new(Arc::clone(&store), launcher, &settings);

    commands::dispatch(&orchestrator, &store, &settings, args.user, args.command).await
}

/// Open (or create) the sqlite database named by `[store]` and apply the
/// schema.
pub fn open_store(section: &StoreSection) -> errors::Result<SqliteStore> {
    let store = if section.is_in_memory() {
        SqliteStore::memory()?
    } else {
        SqliteStore::open(Path::new(&section.path))?
    };
    store.init_schema()?;
    Ok(store)
}
