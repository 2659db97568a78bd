// src/commands.rs

//! Subcommand handlers. Every handler prints a JSON document on stdout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::cli::{Command, ConfigAddArgs, ConfigCommand, ConfigUpdateArgs};
use crate::config::Settings;
use crate::configuration::{ConfigurationUpdate, NewConfiguration};
use crate::orchestrator::Orchestrator;
use crate::provision::provision;
use crate::store::{self, Store};
use crate::types::UserId;

/// Execute one parsed subcommand on behalf of `caller`.
pub async fn dispatch<S>(
    orchestrator: &Orchestrator,
    backend: &Arc<S>,
    settings: &Settings,
    caller: UserId,
    command: Command,
) -> Result<()>
where
    S: Store + 'static,
{
    match command {
        Command::Config(cmd) => config_command(orchestrator, caller, cmd).await,
        Command::Run {
            config_id,
            detach,
            poll_ms,
        } => {
            let run_id = orchestrator.submit_run(config_id, caller).await?;
            let poll_interval = Duration::from_millis(poll_ms.max(1));
            if detach {
                print_json(&json!({ "runId": run_id }))?;
                // The evaluator is a child of this process; stay alive until
                // its result is stored.
                orchestrator
                    .wait_for_terminal(run_id, caller, poll_interval)
                    .await?;
                return Ok(());
            }
            let record = orchestrator
                .wait_for_terminal(run_id, caller, poll_interval)
                .await?;
            print_json(&record)
        }
        Command::Status { run_id } => print_json(&orchestrator.get_run(run_id, caller).await?),
        Command::Results { config_id } => {
            let runs = match config_id {
                Some(config_id) => {
                    orchestrator
                        .list_runs_for_configuration(config_id, caller)
                        .await?
                }
                None => orchestrator.list_runs(caller).await?,
            };
            print_json(&runs)
        }
        Command::Provision => {
            let section = settings.provisioning.clone();
            let report = store::blocking(backend, move |s| provision(s, &section)).await?;
            info!(admins = report.admins_assigned.len(), "provisioning finished");
            print_json(&report)
        }
        Command::Role => {
            let role = orchestrator.role_of(caller).await?;
            print_json(&json!({ "userId": caller, "role": role }))
        }
    }
}

async fn config_command(orchestrator: &Orchestrator, caller: UserId, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Add(args) => {
            let created = orchestrator
                .create_configuration(caller, new_configuration(args))
                .await?;
            print_json(&created)
        }
        ConfigCommand::List => print_json(&orchestrator.list_configurations(caller).await?),
        ConfigCommand::Show { id } => {
            print_json(&orchestrator.get_configuration(id, caller).await?)
        }
        ConfigCommand::Update(args) => {
            let id = args.id;
            let updated = orchestrator
                .update_configuration(id, caller, configuration_update(args))
                .await?;
            print_json(&updated)
        }
        ConfigCommand::Delete { id } => {
            orchestrator.delete_configuration(id, caller).await?;
            print_json(&json!({ "deleted": id }))
        }
    }
}

fn new_configuration(args: ConfigAddArgs) -> NewConfiguration {
    NewConfiguration {
        name: args.name,
        api_url: args.api_url,
        timeout_secs: args.timeout,
        num_samples: args.samples,
        tasks: args.tasks,
    }
}

fn configuration_update(args: ConfigUpdateArgs) -> ConfigurationUpdate {
    ConfigurationUpdate {
        name: args.name,
        api_url: args.api_url,
        timeout_secs: args.timeout,
        num_samples: args.samples,
        tasks: (!args.tasks.is_empty()).then_some(args.tasks),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
