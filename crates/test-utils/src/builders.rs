#![allow(dead_code)]

use std::path::Path;

use benchrun::config::{RawSettings, Settings};
use benchrun::configuration::NewConfiguration;

/// Builder for `NewConfiguration` with values that pass validation.
pub struct ConfigurationBuilder {
    config: NewConfiguration,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self {
            config: NewConfiguration {
                name: "test endpoint".to_string(),
                api_url: "http://localhost:8000".to_string(),
                timeout_secs: 120,
                num_samples: 50,
                tasks: vec!["hellaswag".to_string()],
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    pub fn api_url(mut self, url: &str) -> Self {
        self.config.api_url = url.to_string();
        self
    }

    pub fn timeout_secs(mut self, secs: u32) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn num_samples(mut self, n: u32) -> Self {
        self.config.num_samples = n;
        self
    }

    /// Replace the task list.
    pub fn tasks(mut self, tasks: &[&str]) -> Self {
        self.config.tasks = tasks.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn build(self) -> NewConfiguration {
        self.config
    }
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for validated `Settings`.
pub struct SettingsBuilder {
    raw: RawSettings,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        let mut raw = RawSettings::default();
        raw.store.path = ":memory:".to_string();
        Self { raw }
    }

    pub fn store_path(mut self, path: &Path) -> Self {
        self.raw.store.path = path.to_string_lossy().into_owned();
        self
    }

    pub fn evaluator(mut self, program: &str, script: &Path) -> Self {
        self.raw.evaluator.program = program.to_string();
        self.raw.evaluator.script = script.to_path_buf();
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.raw
            .evaluator
            .env
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn max_concurrent_runs(mut self, n: usize) -> Self {
        self.raw.admission.max_concurrent_runs = n;
        self
    }

    pub fn max_runtime_secs(mut self, secs: u64) -> Self {
        self.raw.evaluator.max_runtime_secs = secs;
        self
    }

    pub fn stderr_excerpt_chars(mut self, n: usize) -> Self {
        self.raw.evaluator.stderr_excerpt_chars = n;
        self
    }

    pub fn admins(mut self, admins: &[i64]) -> Self {
        self.raw.provisioning.admins = admins.to_vec();
        self
    }

    pub fn build(self) -> Settings {
        Settings::try_from(self.raw).expect("Failed to build valid settings from builder")
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
