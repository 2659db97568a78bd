// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::{ConfigId, RunId, UserId};

/// Command-line arguments for `benchrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "benchrun",
    version,
    about = "Launch benchmark evaluator runs and track their results.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the settings file (TOML).
    ///
    /// If omitted, `Benchrun.toml` in the current directory is used when it
    /// exists; otherwise built-in defaults apply.
    #[arg(long, value_name = "PATH", global = true)]
    pub settings: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BENCHRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Identity the command acts on behalf of.
    #[arg(long, value_name = "ID", default_value_t = 1, global = true)]
    pub user: UserId,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Manage benchmark configurations.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Start a run of a configuration.
    Run {
        config_id: ConfigId,

        /// Return right after submitting instead of waiting for the result.
        #[arg(long)]
        detach: bool,

        /// Polling interval while waiting, in milliseconds.
        #[arg(long, value_name = "MS", default_value_t = 500)]
        poll_ms: u64,
    },

    /// Show one run.
    Status { run_id: RunId },

    /// List runs, newest first.
    Results {
        /// Only runs of this configuration.
        #[arg(long = "config", value_name = "ID")]
        config_id: Option<ConfigId>,
    },

    /// Seed admin roles and the sample configuration.
    Provision,

    /// Show the role of the current user.
    Role,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommand {
    /// Create a configuration.
    Add(ConfigAddArgs),
    /// List your configurations.
    List,
    /// Show one configuration.
    Show { id: ConfigId },
    /// Change fields of a configuration.
    Update(ConfigUpdateArgs),
    /// Delete a configuration. Its runs are kept.
    Delete { id: ConfigId },
}

#[derive(Debug, Clone, Args)]
pub struct ConfigAddArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long, value_name = "URL")]
    pub api_url: String,

    /// Per-request timeout in seconds (10-600).
    #[arg(long, value_name = "SECS", default_value_t = crate::configuration::DEFAULT_TIMEOUT_SECS)]
    pub timeout: u32,

    /// Samples per task (1-1000).
    #[arg(long, value_name = "N", default_value_t = crate::configuration::DEFAULT_NUM_SAMPLES)]
    pub samples: u32,

    /// Task identifiers, comma separated or repeated.
    #[arg(long = "task", value_name = "TASK", value_delimiter = ',', required = true)]
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ConfigUpdateArgs {
    pub id: ConfigId,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u32>,

    #[arg(long, value_name = "N")]
    pub samples: Option<u32>,

    /// Replace the task list.
    #[arg(long = "task", value_name = "TASK", value_delimiter = ',')]
    pub tasks: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_add_with_comma_separated_tasks() {
        let args = CliArgs::try_parse_from([
            "benchrun",
            "--user",
            "7",
            "config",
            "add",
            "--name",
            "local",
            "--api-url",
            "http://localhost:8000",
            "--task",
            "hellaswag,arc_easy",
        ])
        .unwrap();

        assert_eq!(args.user, 7);
        match args.command {
            Command::Config(ConfigCommand::Add(add)) => {
                assert_eq!(add.tasks, vec!["hellaswag", "arc_easy"]);
                assert_eq!(add.timeout, 120);
                assert_eq!(add.samples, 50);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_defaults_to_waiting() {
        let args = CliArgs::try_parse_from(["benchrun", "run", "3"]).unwrap();
        match args.command {
            Command::Run {
                config_id, detach, ..
            } => {
                assert_eq!(config_id, 3);
                assert!(!detach);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
