// src/errors.rs

//! Crate-wide error types.
//!
//! `ConfigError` covers everything that must be rejected before a run is
//! allowed to start: unknown or cyclic job references, unresolved command
//! placeholders, and otherwise malformed configuration. The remaining types
//! are scoped failures the engine downgrades instead of propagating: a
//! provisioning failure only takes down one runtime version, and a spawn
//! failure only fails one step.

use thiserror::Error;

/// Fatal configuration-level errors, detected before any job executes.
/// A run aborted by one of these has no partial side effects.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A requested or required job name is not defined.
    #[error("unknown job '{0}'")]
    UnknownJob(String),

    /// The requires graph contains a cycle; members are listed in order.
    #[error("dependency cycle: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// A command template references a value with no definition.
    #[error("undefined value '{placeholder}' in command `{template}`")]
    MissingValue {
        template: String,
        placeholder: String,
    },

    /// Anything else wrong with the configuration file.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Creating a virtualenv or installing requirements into it failed.
/// Scoped to a single runtime version; other versions proceed.
#[derive(Error, Debug)]
#[error("provisioning environment for {version} failed: {reason}")]
pub struct ProvisionError {
    pub version: String,
    pub reason: String,
}

/// The step executor could not spawn the target process at all. The job
/// runner converts this into a failed step result rather than aborting
/// sibling steps or sibling (job, version) pairs.
#[derive(Error, Debug)]
#[error("failed to spawn `{command}`: {source}")]
pub struct SpawnError {
    pub command: String,
    #[source]
    pub source: std::io::Error,
}

pub use anyhow::{Error, Result};
