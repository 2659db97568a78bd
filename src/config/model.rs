// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::types::UserId;

/// Settings as read from a TOML file, before validation.
///
/// ```toml
/// [store]
/// path = "benchrun.db"
///
/// [evaluator]
/// program = "python3.11"
/// script = "benchmarks/run_benchmark.py"
/// env = { HF_HOME = "/tmp/hf" }
///
/// [admission]
/// max_concurrent_runs = 4
///
/// [provisioning]
/// admins = [1]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSettings {
    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub evaluator: EvaluatorSection,

    #[serde(default)]
    pub admission: AdmissionSection,

    #[serde(default)]
    pub provisioning: ProvisioningSection,
}

/// Validated settings. Construct via `Settings::try_from(RawSettings)`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub store: StoreSection,
    pub evaluator: EvaluatorSection,
    pub admission: AdmissionSection,
    pub provisioning: ProvisioningSection,
}

impl Settings {
    pub(crate) fn new_unchecked(raw: RawSettings) -> Self {
        Self {
            store: raw.store,
            evaluator: raw.evaluator,
            admission: raw.admission,
            provisioning: raw.provisioning,
        }
    }

    /// Resolve relative file paths against `root` (the settings file's
    /// directory).
    pub fn resolve_relative_to(mut self, root: &Path) -> Self {
        if !self.store.is_in_memory() {
            let path = PathBuf::from(&self.store.path);
            if path.is_relative() {
                self.store.path = root.join(path).to_string_lossy().into_owned();
            }
        }
        if self.evaluator.script.is_relative() {
            self.evaluator.script = root.join(&self.evaluator.script);
        }
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new_unchecked(RawSettings::default())
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// SQLite database file, or `":memory:"`.
    #[serde(default = "default_store_path")]
    pub path: String,
}

pub const IN_MEMORY_STORE: &str = ":memory:";

impl StoreSection {
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY_STORE
    }
}

fn default_store_path() -> String {
    "benchrun.db".to_string()
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// `[evaluator]` section: how the external evaluator is invoked.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluatorSection {
    /// Interpreter or executable to spawn.
    #[serde(default = "default_program")]
    pub program: String,

    /// Script passed as the first argument to `program`.
    #[serde(default = "default_script")]
    pub script: PathBuf,

    /// Extra environment variables layered over the inherited environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Maximum characters of stderr kept as error text on non-zero exit.
    #[serde(default = "default_stderr_excerpt_chars")]
    pub stderr_excerpt_chars: usize,

    /// Maximum characters of stdout quoted when the output cannot be parsed.
    #[serde(default = "default_stdout_excerpt_chars")]
    pub stdout_excerpt_chars: usize,

    /// Wall-clock limit for one evaluator process; `0` disables it.
    #[serde(default)]
    pub max_runtime_secs: u64,
}

impl EvaluatorSection {
    pub fn max_runtime(&self) -> Option<Duration> {
        (self.max_runtime_secs > 0).then(|| Duration::from_secs(self.max_runtime_secs))
    }
}

fn default_program() -> String {
    "python3.11".to_string()
}

fn default_script() -> PathBuf {
    PathBuf::from("benchmarks/run_benchmark.py")
}

fn default_stderr_excerpt_chars() -> usize {
    1000
}

fn default_stdout_excerpt_chars() -> usize {
    500
}

impl Default for EvaluatorSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            script: default_script(),
            env: BTreeMap::new(),
            stderr_excerpt_chars: default_stderr_excerpt_chars(),
            stdout_excerpt_chars: default_stdout_excerpt_chars(),
            max_runtime_secs: 0,
        }
    }
}

/// `[admission]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionSection {
    /// Maximum evaluator processes running at once; `0` means unbounded.
    #[serde(default)]
    pub max_concurrent_runs: usize,
}

/// `[provisioning]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvisioningSection {
    /// Users seeded with the admin role by `benchrun provision`.
    #[serde(default)]
    pub admins: Vec<UserId>,
}
