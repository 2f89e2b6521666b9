// src/config/mod.rs

//! Configuration loading and validation for jobx.
//!
//! Responsibilities:
//! - Define the TOML-backed data model and its normalization (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate references, the requires graph, and version strings
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{Config, ConfigFile, JobSpec, JobTable, OneOrMany};
pub use validate::validate_config;
