// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::RunStatus;

#[derive(Error, Debug)]
pub enum BenchError {
    /// Configuration or run is absent, or is owned by someone else.
    ///
    /// Both cases produce the same message so that a foreign caller learns
    /// nothing about records it does not own.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid benchmark configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Settings error: {0}")]
    SettingsError(String),

    #[error("Run store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid run transition from {from} to {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },

    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BenchError {
    pub fn configuration_not_found(id: i64) -> Self {
        BenchError::NotFound(format!("benchmark configuration {id}"))
    }

    pub fn run_not_found(id: i64) -> Self {
        BenchError::NotFound(format!("benchmark run {id}"))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BenchError>;
