// src/venv/provision.rs

//! Pluggable environment provisioning.
//!
//! The manager talks to a [`Provisioner`] instead of running `venv` and pip
//! directly. This makes it easy to swap in a fake provisioner in tests while
//! keeping the production implementation here.
//!
//! - [`PipProvisioner`] is the default implementation. It creates the
//!   virtualenv with `python -m venv`, upgrades pip, installs the declared
//!   requirement files, and installs the project itself when a build
//!   definition is present.
//! - Tests can provide their own `Provisioner` that, for example, records
//!   which versions were provisioned without touching the filesystem.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::ProvisionError;
use crate::runtime::{Interpreter, PythonVersion};

use super::{EnvUpdate, Environment};

/// Trait abstracting how an environment is created and populated.
///
/// `provision` is called with the per-version lock already held, so an
/// implementation never races with itself for the same environment.
pub trait Provisioner: Send + Sync {
    fn provision<'a>(
        &'a self,
        interpreter: &'a Interpreter,
        env: &'a Environment,
        requirements: &'a [PathBuf],
        project_root: &'a Path,
        updates: &'a mpsc::Sender<EnvUpdate>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProvisionError>> + Send + 'a>>;
}

/// Real provisioner used in production: `python -m venv` plus pip.
pub struct PipProvisioner;

impl Provisioner for PipProvisioner {
    fn provision<'a>(
        &'a self,
        interpreter: &'a Interpreter,
        env: &'a Environment,
        requirements: &'a [PathBuf],
        project_root: &'a Path,
        updates: &'a mpsc::Sender<EnvUpdate>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProvisionError>> + Send + 'a>> {
        Box::pin(async move {
            let version = &env.version;
            info!(version = %version, venv = %env.venv.display(), "provisioning environment");

            progress(updates, version, "creating virtualenv").await;
            let prompt = format!("jobx-{version}");
            let mut create = Command::new(&interpreter.path);
            create
                .arg("-m")
                .arg("venv")
                .arg("--clear")
                .arg("--prompt")
                .arg(&prompt)
                .arg(&env.venv);
            run_tool(version, create, "creating virtualenv").await?;

            progress(updates, version, "upgrading pip").await;
            let mut upgrade = Command::new(&env.python);
            upgrade.args(["-m", "pip", "install", "-U", "pip"]);
            run_tool(version, upgrade, "upgrading pip").await?;

            if !requirements.is_empty() {
                progress(updates, version, "installing requirements").await;
                debug!(version = %version, ?requirements, "installing requirement files");
                let mut install = Command::new(&env.python);
                install.args(["-m", "pip", "install", "-U"]);
                for requirement in requirements {
                    install.arg("-r").arg(requirement);
                }
                run_tool(version, install, "installing requirements").await?;
            }

            if has_project_definition(project_root) {
                progress(updates, version, "installing project").await;
                let mut install = Command::new(&env.python);
                install.args(["-m", "pip", "install", "-U"]).arg(project_root);
                run_tool(version, install, "installing project").await?;
            }

            Ok(())
        })
    }
}

/// True when the project root carries something pip can install.
fn has_project_definition(root: &Path) -> bool {
    root.join("pyproject.toml").is_file() || root.join("setup.py").is_file()
}

async fn progress(updates: &mpsc::Sender<EnvUpdate>, version: &PythonVersion, message: &str) {
    let _ = updates
        .send(EnvUpdate::Progress {
            version: version.clone(),
            message: message.to_string(),
        })
        .await;
}

/// Run one provisioning command to completion, turning a spawn failure or a
/// nonzero exit into a [`ProvisionError`] for this version.
async fn run_tool(
    version: &PythonVersion,
    mut cmd: Command,
    what: &str,
) -> Result<(), ProvisionError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(version = %version, step = what, "running provisioning command");
    let output = cmd.output().await.map_err(|e| ProvisionError {
        version: version.to_string(),
        reason: format!("{what}: {e}"),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProvisionError {
            version: version.to_string(),
            reason: format!(
                "{what} exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ),
        });
    }
    Ok(())
}
