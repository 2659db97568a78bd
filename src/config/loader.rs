// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawSettings, Settings};
use crate::errors::Result;

/// Load a settings file from a given path and return the raw `RawSettings`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSettings> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let settings: RawSettings = toml::from_str(&contents)?;

    Ok(settings)
}

/// Load a settings file from path and run validation.
///
/// Relative `store.path` and `evaluator.script` entries are resolved against
/// the directory containing the settings file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;
    let settings = Settings::try_from(raw)?;
    Ok(settings.resolve_relative_to(&settings_root_dir(path)))
}

/// Load settings for the CLI.
///
/// - An explicit path must exist.
/// - Without one, `Benchrun.toml` is used if present, otherwise defaults.
pub fn load_or_default(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        return load_and_validate(path);
    }

    let default_path = default_settings_path();
    if default_path.is_file() {
        load_and_validate(&default_path)
    } else {
        debug!(path = %default_path.display(), "no settings file found; using defaults");
        Ok(Settings::default())
    }
}

/// Default settings location: `Benchrun.toml` in the working directory.
pub fn default_settings_path() -> PathBuf {
    PathBuf::from("Benchrun.toml")
}

/// - If the settings path has a non-empty parent (e.g. "deploy/Benchrun.toml"),
///   we use that directory.
/// - If it's just a bare filename, we fall back to the current working
///   directory.
fn settings_root_dir(settings_path: &Path) -> PathBuf {
    match settings_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
