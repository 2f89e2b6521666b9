// src/runtime/locator.rs

//! Discovery of installed Python interpreters.
//!
//! The orchestrator only depends on [`InterpreterLocator`]; the production
//! implementation probes `PATH` for `pythonX.Y` style binaries and asks each
//! one for its version. Probe results are cached per binary path so a run
//! over many jobs and versions spawns each interpreter at most once.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, warn};

use super::version::{PythonVersion, VersionSpec};

/// Pattern matching the version line printed by `python -V`.
const VERSION_OUTPUT_PATTERN: &str = r"Python (\d+\.\d+\S+)";

/// Compiled once, reused for every probe.
static VERSION_OUTPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(VERSION_OUTPUT_PATTERN).expect("valid regex"));

/// How long a probed binary gets to print its version before it is killed.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

const PROBE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An installed interpreter: the concrete version it reports plus the path
/// of the binary that reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub version: PythonVersion,
    pub path: PathBuf,
}

/// Outcome of resolving a set of version specifiers.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Matched interpreters, highest version first, deduplicated by version.
    pub interpreters: Vec<Interpreter>,
    /// Specifiers that matched no installed interpreter.
    pub unresolved: Vec<VersionSpec>,
}

/// Interface to interpreter discovery.
///
/// Production code uses [`PathLocator`]; tests substitute a fake that maps
/// specifiers to canned interpreters without touching the filesystem.
pub trait InterpreterLocator: Send + Sync {
    /// Resolve the requested specifiers against the installed interpreters.
    ///
    /// Each specifier independently resolves to the first `PATH` binary whose
    /// reported version matches it, or is recorded as unresolved. The result
    /// is sorted highest version first.
    fn resolve(&self, specs: &[VersionSpec]) -> Resolution;

    /// Locate the currently active interpreter, used when no version matrix
    /// is requested.
    fn active(&self) -> Option<Interpreter>;
}

/// Locator that probes binaries found on `PATH`.
pub struct PathLocator {
    probe_cache: Mutex<HashMap<PathBuf, Option<PythonVersion>>>,
}

impl PathLocator {
    pub fn new() -> Self {
        Self {
            probe_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Find the first binary on `PATH` whose reported version matches `spec`.
    fn find_match(&self, spec: &VersionSpec) -> Option<Interpreter> {
        for name in candidate_names(spec) {
            let Some(path) = find_in_path(&name) else {
                continue;
            };
            let Some(version) = self.probe(&path) else {
                continue;
            };
            if spec.matches(&version) {
                debug!(spec = %spec, version = %version, path = %path.display(), "resolved interpreter");
                return Some(Interpreter { version, path });
            }
            debug!(spec = %spec, version = %version, path = %path.display(), "version mismatch");
        }
        None
    }

    /// Ask a binary for its version, consulting the cache first.
    fn probe(&self, path: &Path) -> Option<PythonVersion> {
        {
            let cache = self.probe_cache.lock().ok()?;
            if let Some(cached) = cache.get(path) {
                return cached.clone();
            }
        }
        let probed = probe_binary(path);
        if let Ok(mut cache) = self.probe_cache.lock() {
            cache.insert(path.to_path_buf(), probed.clone());
        }
        probed
    }
}

impl Default for PathLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl InterpreterLocator for PathLocator {
    fn resolve(&self, specs: &[VersionSpec]) -> Resolution {
        let mut interpreters: Vec<Interpreter> = Vec::new();
        let mut unresolved = Vec::new();

        for spec in specs {
            match self.find_match(spec) {
                Some(interp) => {
                    if !interpreters.iter().any(|i| i.version == interp.version) {
                        interpreters.push(interp);
                    }
                }
                None => {
                    warn!(spec = %spec, "no matching python interpreter on PATH");
                    unresolved.push(spec.clone());
                }
            }
        }

        interpreters.sort_by(|a, b| b.version.cmp(&a.version));
        Resolution {
            interpreters,
            unresolved,
        }
    }

    fn active(&self) -> Option<Interpreter> {
        for name in ["python3", "python"] {
            let Some(path) = find_in_path(name) else {
                continue;
            };
            if let Some(version) = self.probe(&path) {
                return Some(Interpreter { version, path });
            }
        }
        None
    }
}

/// Binary names to try for a specifier, most specific first: `python3.9`,
/// then `python3`, then `python`.
fn candidate_names(spec: &VersionSpec) -> Vec<String> {
    let release = spec.release();
    let mut names = Vec::new();
    if release.len() >= 2 {
        names.push(format!("python{}.{}", release[0], release[1]));
    }
    if !release.is_empty() {
        names.push(format!("python{}", release[0]));
    }
    names.push("python".to_string());
    names
}

/// First executable named `name` on `PATH`, if any.
fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{name}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Run `<binary> -V` and parse the reported version. Returns `None` when the
/// binary fails to spawn, prints something unrecognized, or exceeds the
/// probe timeout.
fn probe_binary(path: &Path) -> Option<PythonVersion> {
    let mut child = match Command::new(path)
        .arg("-V")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "failed to spawn interpreter probe");
            return None;
        }
    };

    let deadline = Instant::now() + PROBE_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => {
                if Instant::now() >= deadline {
                    warn!(path = %path.display(), "interpreter probe timed out");
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                std::thread::sleep(PROBE_POLL_INTERVAL);
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "interpreter probe failed");
                return None;
            }
        }
    }

    let mut output = String::new();
    child.stdout.take()?.read_to_string(&mut output).ok()?;
    parse_probe_output(&output, path)
}

fn parse_probe_output(output: &str, path: &Path) -> Option<PythonVersion> {
    let captures = VERSION_OUTPUT_RE.captures(output)?;
    match captures[1].parse::<PythonVersion>() {
        Ok(version) => Some(version),
        Err(e) => {
            debug!(path = %path.display(), output = %output.trim(), error = %e, "unparseable probe output");
            None
        }
    }
}
