// src/configuration.rs

//! Benchmark configurations: the user-defined endpoint plus parameters that
//! a run is launched against.
//!
//! Bounds mirror what the evaluator accepts:
//! - `timeout_secs` in `[10, 600]` (default 120)
//! - `num_samples` in `[1, 1000]` (default 50)
//! - at least one task, each a plain identifier that cannot be mistaken for
//!   an evaluator flag.

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{BenchError, Result};
use crate::types::{ConfigId, UserId};

pub const TIMEOUT_SECS_RANGE: RangeInclusive<u32> = 10..=600;
pub const NUM_SAMPLES_RANGE: RangeInclusive<u32> = 1..=1000;
pub const DEFAULT_TIMEOUT_SECS: u32 = 120;
pub const DEFAULT_NUM_SAMPLES: u32 = 50;
const MAX_NAME_LEN: usize = 255;
const MAX_URL_LEN: usize = 512;

static TASK_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.][A-Za-z0-9_.\-]*$").expect("task id pattern compiles")
});

/// A persisted benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkConfiguration {
    pub id: ConfigId,
    pub user_id: UserId,
    pub name: String,
    pub api_url: String,
    pub timeout_secs: u32,
    pub num_samples: u32,
    /// Ordered task identifiers; the evaluator receives them in this order.
    pub tasks: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BenchmarkConfiguration {
    pub fn is_owned_by(&self, caller: UserId) -> bool {
        self.user_id == caller
    }
}

/// Input for creating a configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConfiguration {
    pub name: String,
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,
    #[serde(default = "default_num_samples")]
    pub num_samples: u32,
    pub tasks: Vec<String>,
}

fn default_timeout_secs() -> u32 {
    DEFAULT_TIMEOUT_SECS
}

fn default_num_samples() -> u32 {
    DEFAULT_NUM_SAMPLES
}

impl NewConfiguration {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_api_url(&self.api_url)?;
        validate_timeout(self.timeout_secs)?;
        validate_num_samples(self.num_samples)?;
        validate_tasks(&self.tasks)?;
        Ok(())
    }
}

/// Partial update of a configuration. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationUpdate {
    pub name: Option<String>,
    pub api_url: Option<String>,
    pub timeout_secs: Option<u32>,
    pub num_samples: Option<u32>,
    pub tasks: Option<Vec<String>>,
}

impl ConfigurationUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.api_url.is_none()
            && self.timeout_secs.is_none()
            && self.num_samples.is_none()
            && self.tasks.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(url) = &self.api_url {
            validate_api_url(url)?;
        }
        if let Some(timeout) = self.timeout_secs {
            validate_timeout(timeout)?;
        }
        if let Some(samples) = self.num_samples {
            validate_num_samples(samples)?;
        }
        if let Some(tasks) = &self.tasks {
            validate_tasks(tasks)?;
        }
        Ok(())
    }

    /// Apply the update onto an existing configuration.
    pub fn apply_to(&self, config: &mut BenchmarkConfiguration, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout_secs = timeout;
        }
        if let Some(samples) = self.num_samples {
            config.num_samples = samples;
        }
        if let Some(tasks) = &self.tasks {
            config.tasks = tasks.clone();
        }
        config.updated_at = now;
    }
}

fn validate_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(BenchError::InvalidConfiguration(format!(
            "name must be 1..={MAX_NAME_LEN} characters (got {len})"
        )));
    }
    Ok(())
}

fn validate_api_url(url: &str) -> Result<()> {
    let len = url.chars().count();
    if url.trim().is_empty() || len > MAX_URL_LEN {
        return Err(BenchError::InvalidConfiguration(format!(
            "api url must be 1..={MAX_URL_LEN} characters (got {len})"
        )));
    }
    Ok(())
}

fn validate_timeout(timeout_secs: u32) -> Result<()> {
    if !TIMEOUT_SECS_RANGE.contains(&timeout_secs) {
        return Err(BenchError::InvalidConfiguration(format!(
            "timeout must be within {}..={} seconds (got {timeout_secs})",
            TIMEOUT_SECS_RANGE.start(),
            TIMEOUT_SECS_RANGE.end()
        )));
    }
    Ok(())
}

fn validate_num_samples(num_samples: u32) -> Result<()> {
    if !NUM_SAMPLES_RANGE.contains(&num_samples) {
        return Err(BenchError::InvalidConfiguration(format!(
            "sample count must be within {}..={} (got {num_samples})",
            NUM_SAMPLES_RANGE.start(),
            NUM_SAMPLES_RANGE.end()
        )));
    }
    Ok(())
}

fn validate_tasks(tasks: &[String]) -> Result<()> {
    if tasks.is_empty() {
        return Err(BenchError::InvalidConfiguration(
            "at least one task is required".to_string(),
        ));
    }

    for task in tasks {
        if !TASK_ID.is_match(task) {
            return Err(BenchError::InvalidConfiguration(format!(
                "invalid task identifier '{task}' (letters, digits, '_', '.', '-'; must not start with '-')"
            )));
        }
    }
    Ok(())
}
