// src/config/mod.rs

//! Orchestrator settings for benchrun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a settings file from disk (`loader.rs`).
//! - Validate basic invariants like a usable evaluator command (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_settings_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    AdmissionSection, EvaluatorSection, ProvisioningSection, RawSettings, Settings, StoreSection,
};
