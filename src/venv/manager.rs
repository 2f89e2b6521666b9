// src/venv/manager.rs

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use blake3::Hasher;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::ProvisionError;
use crate::runtime::{Interpreter, PythonVersion};

use super::provision::Provisioner;
use super::{EnvUpdate, Environment};

/// Directory under the project root holding everything jobx owns on disk.
pub const TOOL_DIR: &str = ".jobx";

/// Marker file inside each venv recording the requirements hash it was
/// built from.
const MARKER_FILE: &str = "jobx.hash";

/// Owns the on-disk environment cache for one orchestrator.
///
/// Acquisition is keyed by Python version. Concurrent `acquire` calls for
/// the same version serialize on a per-version async lock: the first caller
/// provisions, later callers find the environment marked ready and reuse
/// it. Different versions provision fully in parallel.
pub struct EnvManager {
    root: PathBuf,
    /// Configured requirement files; `None` discovers `requirements*.txt`.
    requirements: Option<Vec<PathBuf>>,
    provisioner: Arc<dyn Provisioner>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    ready: Mutex<HashMap<String, Environment>>,
}

impl EnvManager {
    pub fn new(config: &Config, provisioner: Arc<dyn Provisioner>) -> Self {
        Self {
            root: config.root.clone(),
            requirements: config.requirements.clone(),
            provisioner,
            locks: Mutex::new(HashMap::new()),
            ready: Mutex::new(HashMap::new()),
        }
    }

    /// Get the environment for `interpreter`, provisioning it first when the
    /// cached one is missing or was built from different requirements.
    ///
    /// Always emits `EnvUpdate::Ready` on success, whether or not any work
    /// was done.
    pub async fn acquire(
        &self,
        interpreter: &Interpreter,
        updates: &mpsc::Sender<EnvUpdate>,
    ) -> Result<Environment, ProvisionError> {
        let version = interpreter.version.clone();
        let lock = self.lock_for(version.as_str());
        let _guard = lock.lock().await;

        if let Some(existing) = self.ready_environment(version.as_str()) {
            send_ready(updates, &version).await;
            return Ok(existing);
        }

        let env = self.environment_for(&version);
        let requirements = self.requirement_paths();
        let hash = hash_requirements(&requirements).map_err(|e| ProvisionError {
            version: version.to_string(),
            reason: format!("hashing requirement files: {e}"),
        })?;

        if self.is_current(&env, &hash) {
            debug!(version = %version, venv = %env.venv.display(), "reusing existing environment");
        } else {
            self.provisioner
                .provision(interpreter, &env, &requirements, &self.root, updates)
                .await?;
            write_marker(&env, &hash).map_err(|e| ProvisionError {
                version: version.to_string(),
                reason: format!("writing environment marker: {e}"),
            })?;
            info!(version = %version, venv = %env.venv.display(), "environment ready");
        }

        self.mark_ready(version.as_str(), env.clone());
        send_ready(updates, &version).await;
        Ok(env)
    }

    /// Delete the whole managed tree. Idempotent; missing directories are
    /// not an error.
    pub fn clean(&self) -> Result<()> {
        let dir = self.root.join(TOOL_DIR);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!(dir = %dir.display(), "removed managed environments");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {:?}", dir)),
        }
    }

    /// Layout: `.jobx/venv/<version>` with the interpreter in the venv's
    /// binary directory.
    fn environment_for(&self, version: &PythonVersion) -> Environment {
        let venv = self
            .root
            .join(TOOL_DIR)
            .join("venv")
            .join(version.as_str());
        let mut env = Environment {
            version: version.clone(),
            venv,
            python: PathBuf::new(),
        };
        let python = if cfg!(windows) { "python.exe" } else { "python" };
        env.python = env.bin_dir().join(python);
        env
    }

    /// Configured requirement files resolved against the root, or the
    /// discovered `requirements*.txt` files when none are configured.
    fn requirement_paths(&self) -> Vec<PathBuf> {
        match &self.requirements {
            Some(configured) => configured.iter().map(|p| self.root.join(p)).collect(),
            None => discover_requirements(&self.root),
        }
    }

    /// The environment is current when its marker matches the requirements
    /// hash and its interpreter still resolves.
    fn is_current(&self, env: &Environment, hash: &str) -> bool {
        if !env.python.is_file() {
            return false;
        }
        match fs::read_to_string(env.venv.join(MARKER_FILE)) {
            Ok(recorded) => recorded.trim() == hash,
            Err(_) => false,
        }
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn ready_environment(&self, key: &str) -> Option<Environment> {
        let ready = self.ready.lock().unwrap_or_else(|e| e.into_inner());
        ready.get(key).cloned()
    }

    fn mark_ready(&self, key: &str, env: Environment) {
        let mut ready = self.ready.lock().unwrap_or_else(|e| e.into_inner());
        ready.insert(key.to_string(), env);
    }
}

async fn send_ready(updates: &mpsc::Sender<EnvUpdate>, version: &PythonVersion) {
    let _ = updates
        .send(EnvUpdate::Ready {
            version: version.clone(),
        })
        .await;
}

/// `requirements*.txt` files in the project root, sorted for stable hashing.
fn discover_requirements(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "failed to scan for requirement files");
            return paths;
        }
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("requirements") && name.ends_with(".txt") {
            paths.push(entry.path());
        }
    }
    paths.sort();
    paths
}

/// Deterministic hash over the names and contents of the requirement files.
/// Missing files are skipped; installation surfaces those separately.
fn hash_requirements(paths: &[PathBuf]) -> Result<String> {
    let mut sorted: Vec<&PathBuf> = paths.iter().collect();
    sorted.sort();

    let mut hasher = Hasher::new();
    for path in sorted {
        if !path.is_file() {
            continue;
        }
        hasher.update(path.to_string_lossy().as_bytes());
        let mut file =
            File::open(path).with_context(|| format!("opening requirement file {:?}", path))?;
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }
    Ok(hasher.finalize().to_hex().to_string())
}

fn write_marker(env: &Environment, hash: &str) -> Result<()> {
    let path = env.venv.join(MARKER_FILE);
    fs::write(&path, format!("{hash}\n"))
        .with_context(|| format!("writing marker file {:?}", path))
}
