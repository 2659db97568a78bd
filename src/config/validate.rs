// src/config/validate.rs

use crate::config::model::{RawSettings, Settings};
use crate::errors::{BenchError, Result};

impl TryFrom<RawSettings> for Settings {
    type Error = BenchError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        validate_raw_settings(&raw)?;
        Ok(Settings::new_unchecked(raw))
    }
}

fn validate_raw_settings(raw: &RawSettings) -> Result<()> {
    validate_store(raw)?;
    validate_evaluator(raw)?;
    validate_provisioning(raw)?;
    Ok(())
}

fn validate_store(raw: &RawSettings) -> Result<()> {
    if raw.store.path.trim().is_empty() {
        return Err(BenchError::SettingsError(
            "[store].path must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_evaluator(raw: &RawSettings) -> Result<()> {
    let evaluator = &raw.evaluator;

    if evaluator.program.trim().is_empty() {
        return Err(BenchError::SettingsError(
            "[evaluator].program must not be empty".to_string(),
        ));
    }
    if evaluator.script.as_os_str().is_empty() {
        return Err(BenchError::SettingsError(
            "[evaluator].script must not be empty".to_string(),
        ));
    }
    if evaluator.stderr_excerpt_chars == 0 {
        return Err(BenchError::SettingsError(
            "[evaluator].stderr_excerpt_chars must be >= 1 (got 0)".to_string(),
        ));
    }
    if evaluator.stdout_excerpt_chars == 0 {
        return Err(BenchError::SettingsError(
            "[evaluator].stdout_excerpt_chars must be >= 1 (got 0)".to_string(),
        ));
    }
    for key in evaluator.env.keys() {
        if key.is_empty() || key.contains('=') {
            return Err(BenchError::SettingsError(format!(
                "[evaluator].env has invalid variable name '{key}'"
            )));
        }
    }
    Ok(())
}

fn validate_provisioning(raw: &RawSettings) -> Result<()> {
    if let Some(bad) = raw.provisioning.admins.iter().find(|id| **id <= 0) {
        return Err(BenchError::SettingsError(format!(
            "[provisioning].admins must contain positive user ids (got {bad})"
        )));
    }
    Ok(())
}
