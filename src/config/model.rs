// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{Job, Values};

/// Top-level configuration as read from a `Jobx.toml` file.
///
/// This is a direct mapping of the file format:
///
/// ```toml
/// default = ["lint", "test"]
/// python_versions = ["3.9", "3.10", "3.11"]
/// requirements = ["requirements.txt"]
/// watch_paths = ["src"]
///
/// [values]
/// module = "jobx"
///
/// [jobs]
/// lint = "flake8 {module}"
/// format = ["black {module}", "isort {module}"]
/// test = { run = "python -m {module}.tests", requires = ["lint"] }
/// ```
///
/// All sections are optional. Job declarations are polymorphic (string,
/// list, or table) and are normalized into canonical [`Job`] values by
/// [`ConfigFile::normalize`]; nothing outside this module ever sees the
/// raw shapes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Jobs run when the command line requests none.
    #[serde(default)]
    pub default: OneOrMany,

    /// Python versions forming the matrix. Empty means "the active
    /// interpreter only".
    #[serde(default)]
    pub python_versions: Vec<String>,

    /// Requirement files installed into each environment. When absent,
    /// `requirements*.txt` files in the project root are discovered at
    /// provisioning time.
    #[serde(default)]
    pub requirements: Option<OneOrMany>,

    /// Paths watched in watch mode, relative to the project root. Empty
    /// means the project root itself.
    #[serde(default)]
    pub watch_paths: OneOrMany,

    /// Extra glob patterns ignored in watch mode, on top of the built-in
    /// ignores (the environment tree, `.git`, caches).
    #[serde(default)]
    pub watch_exclude: OneOrMany,

    /// Static values available to `{placeholder}` command templates.
    #[serde(default)]
    pub values: BTreeMap<String, String>,

    /// All jobs from `[jobs]`. Keys are the job names.
    #[serde(default)]
    pub jobs: BTreeMap<String, JobSpec>,
}

/// A field that accepts either one string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(_) => false,
            Self::Many(v) => v.is_empty(),
        }
    }
}

impl Default for OneOrMany {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// `[jobs.<name>]` in any of its three accepted shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JobSpec {
    /// `lint = "flake8 jobx"`
    Command(String),
    /// `format = ["black jobx", "isort jobx"]`
    Commands(Vec<String>),
    /// `test = { run = "...", requires = ["lint"], once = true }`
    Full(JobTable),
}

/// The table form of a job declaration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobTable {
    #[serde(default)]
    pub run: OneOrMany,

    #[serde(default)]
    pub requires: OneOrMany,

    #[serde(default)]
    pub once: bool,

    #[serde(default)]
    pub parallel: bool,

    /// Print captured output even when every step succeeds.
    #[serde(default)]
    pub show_output: bool,
}

impl JobSpec {
    /// Normalize this declaration into the canonical [`Job`] form.
    ///
    /// Job names and `requires` references are casefolded so lookups are
    /// case-insensitive throughout.
    pub fn into_job(self, name: &str) -> Job {
        let name = name.to_lowercase();
        match self {
            Self::Command(cmd) => Job::new(name, vec![cmd]),
            Self::Commands(cmds) => Job::new(name, cmds),
            Self::Full(table) => {
                let mut job = Job::new(name, table.run.into_vec());
                job.requires = table
                    .requires
                    .into_vec()
                    .into_iter()
                    .map(|r| r.to_lowercase())
                    .collect();
                job.once = table.once;
                job.parallel = table.parallel;
                job.show_output = table.show_output;
                job
            }
        }
    }
}

/// Validated, normalized configuration handed to the rest of the
/// application. One immutable snapshot per run; watch mode builds a fresh
/// one from disk between runs.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Project root: the directory containing the config file.
    pub root: PathBuf,

    /// Canonical jobs keyed by casefolded name.
    pub jobs: BTreeMap<String, Job>,

    /// Jobs run when none are requested.
    pub default: Vec<String>,

    /// Template values.
    pub values: Values,

    /// Configured version matrix, as written (unparsed specifiers are
    /// rejected during validation).
    pub versions: Vec<String>,

    /// Configured requirement files; `None` means discover
    /// `requirements*.txt` in the root.
    pub requirements: Option<Vec<PathBuf>>,

    /// Watched paths, relative to root. Empty means the root itself.
    pub watch_paths: Vec<PathBuf>,

    /// Extra watch ignore patterns.
    pub watch_exclude: Vec<String>,
}

impl ConfigFile {
    /// Convert the raw file into the canonical [`Config`], casefolding job
    /// names and flattening the polymorphic declarations.
    pub fn normalize(self, root: PathBuf) -> Config {
        let jobs: BTreeMap<String, Job> = self
            .jobs
            .into_iter()
            .map(|(name, spec)| {
                let job = spec.into_job(&name);
                (job.name.clone(), job)
            })
            .collect();

        Config {
            root,
            jobs,
            default: self
                .default
                .into_vec()
                .into_iter()
                .map(|n| n.to_lowercase())
                .collect(),
            values: self.values,
            versions: self.python_versions,
            requirements: self
                .requirements
                .map(|r| r.into_vec().into_iter().map(PathBuf::from).collect()),
            watch_paths: self
                .watch_paths
                .into_vec()
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            watch_exclude: self.watch_exclude.into_vec(),
        }
    }
}
