// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::model::{Config, ConfigFile};
use crate::config::validate::validate_config;

/// Load a configuration file from a given path and return the raw
/// `ConfigFile`.
///
/// This only performs TOML deserialization; it does **not** normalize the
/// polymorphic job shapes or run semantic validation. Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {:?}", path))?;

    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML config from {:?}", path))?;

    Ok(config)
}

/// Load a configuration file, normalize it, and run validation.
///
/// This is the entry point for the rest of the application:
///
/// - Reads TOML.
/// - Normalizes polymorphic job declarations into canonical [`Config`]
///   (casefolded names, flat string lists).
/// - Checks undefined `default`/`requires` references, requires cycles,
///   empty jobs, and unparseable version strings.
///
/// The project root is the directory containing the config file; relative
/// watch paths and requirement files resolve against it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;

    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let config = raw.normalize(root);
    validate_config(&config)?;
    Ok(config)
}

/// Default config path: `Jobx.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Jobx.toml")
}
