// src/exec/command.rs

//! Evaluator command construction.
//!
//! The argument list is a pure function of the settings and configuration:
//!
//! ```text
//! <program> <script> --api-url <url> --samples <n> --timeout <secs> --tasks <t1> <t2> ...
//! ```
//!
//! Tasks are passed through a single multi-valued `--tasks` flag in
//! configuration order.

use std::collections::BTreeMap;

use crate::config::EvaluatorSection;
use crate::configuration::BenchmarkConfiguration;

/// A fully resolved evaluator invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl EvaluatorCommand {
    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

pub fn build_evaluator_command(
    evaluator: &EvaluatorSection,
    config: &BenchmarkConfiguration,
) -> EvaluatorCommand {
    let mut args = vec![
        evaluator.script.to_string_lossy().into_owned(),
        "--api-url".to_string(),
        config.api_url.clone(),
        "--samples".to_string(),
        config.num_samples.to_string(),
        "--timeout".to_string(),
        config.timeout_secs.to_string(),
        "--tasks".to_string(),
    ];
    args.extend(config.tasks.iter().cloned());

    EvaluatorCommand {
        program: evaluator.program.clone(),
        args,
        env: evaluator.env.clone(),
    }
}
