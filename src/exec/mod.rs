// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the external evaluator,
//! using `tokio::process::Command`, and reporting back to the run driver via
//! a per-run stream of [`ProcessEvent`]s.
//!
//! - [`command`] derives the evaluator argument list from a configuration.
//! - [`process`] spawns one evaluator process and streams its output.
//! - [`backend`] provides the `Launcher` trait and the event type; the
//!   production implementation is [`ProcessLauncher`], and tests can replace
//!   it with a scripted fake.

pub mod backend;
pub mod command;
pub mod process;

pub use backend::{LaunchRequest, Launcher, ProcessEvent};
pub use command::{build_evaluator_command, EvaluatorCommand};
pub use process::ProcessLauncher;
