// src/venv/mod.rs

//! Managed virtualenvs, one per selected Python version.
//!
//! Environments live under `.jobx/venv/<version>` in the project root and
//! persist across runs. A marker file records the content hash of the
//! requirement files the environment was built from; when the hash still
//! matches and the venv's interpreter is present, the environment is reused
//! as-is, otherwise it is rebuilt in place.

pub mod manager;
pub mod provision;

use std::path::PathBuf;

use crate::runtime::PythonVersion;

pub use manager::EnvManager;
pub use provision::{PipProvisioner, Provisioner};

/// An isolated execution context bound to exactly one Python version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub version: PythonVersion,
    /// Root of the virtualenv directory.
    pub venv: PathBuf,
    /// The virtualenv's own interpreter binary.
    pub python: PathBuf,
}

impl Environment {
    /// Directory holding the venv's executables, prepended to `PATH` when
    /// steps run inside this environment.
    pub fn bin_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv.join("Scripts")
        } else {
            self.venv.join("bin")
        }
    }
}

/// Progress notifications emitted while environments are prepared. The
/// engine forwards these to the presentation layer.
#[derive(Debug, Clone)]
pub enum EnvUpdate {
    Progress {
        version: PythonVersion,
        message: String,
    },
    Ready {
        version: PythonVersion,
    },
}
