// src/types.rs

//! Core data model shared across planning, execution, and reporting.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::runtime::PythonVersion;

/// Public type alias for job names throughout the engine.
pub type JobName = String;

/// Static values available to command templates, supplied by configuration.
pub type Values = BTreeMap<String, String>;

/// One named unit of work: an ordered list of command templates plus
/// dependency edges and execution policy flags.
///
/// Jobs are normalized at the configuration boundary (names casefolded,
/// string/list/table declarations flattened) so the engine only ever sees
/// this canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub name: JobName,
    /// Unrendered command templates, executed in order (or fanned out when
    /// `parallel` is set).
    pub run: Vec<String>,
    /// Names of jobs that must complete successfully first.
    pub requires: Vec<JobName>,
    /// Run a single time on the highest selected version instead of once
    /// per version.
    pub once: bool,
    /// Run the steps concurrently instead of sequentially.
    pub parallel: bool,
    /// Always display captured output, not only on failure.
    pub show_output: bool,
}

impl Job {
    pub fn new(name: impl Into<JobName>, run: Vec<String>) -> Self {
        Self {
            name: name.into(),
            run,
            requires: Vec::new(),
            once: false,
            parallel: false,
            show_output: false,
        }
    }
}

/// Terminal state of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The process ran to completion with this exit code.
    Exited(i32),
    /// Never started: an earlier sequential step failed.
    NotRun,
    /// Interrupted by run cancellation.
    Cancelled,
}

/// Outcome of one step of one job on one runtime version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// The rendered command line.
    pub cmd: String,
    pub status: StepStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl StepResult {
    /// A step that never ran because a preceding sequential step failed.
    pub fn not_run(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            status: StepStatus::NotRun,
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::ZERO,
        }
    }

    /// A step cut short by run cancellation.
    pub fn cancelled(cmd: impl Into<String>, duration: Duration) -> Self {
        Self {
            cmd: cmd.into(),
            status: StepStatus::Cancelled,
            stdout: String::new(),
            stderr: String::new(),
            duration,
        }
    }

    /// A step whose process could not be spawned at all. Recorded as a
    /// failure with exit code -1 and the error text on stderr.
    pub fn spawn_failed(cmd: impl Into<String>, error: impl ToString) -> Self {
        Self {
            cmd: cmd.into(),
            status: StepStatus::Exited(-1),
            stdout: String::new(),
            stderr: error.to_string(),
            duration: Duration::ZERO,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.status, StepStatus::Exited(0))
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            StepStatus::Exited(code) => Some(code),
            _ => None,
        }
    }
}

/// Terminal state of one (job, version) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Every step succeeded.
    Passed,
    /// A step failed, the environment could not be provisioned, or a
    /// process could not be spawned.
    Failed,
    /// Skipped because a required job failed on this version.
    Blocked,
    /// Interrupted by run cancellation.
    Cancelled,
}

/// Outcome of one job on one runtime version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub job: JobName,
    pub version: PythonVersion,
    /// One entry per step, in declaration order; steps that never ran are
    /// recorded as [`StepStatus::NotRun`].
    pub steps: Vec<StepResult>,
    pub status: JobStatus,
    /// Wall-clock span of the whole job, not the sum of step durations.
    pub duration: Duration,
}

impl JobResult {
    pub fn success(&self) -> bool {
        self.status == JobStatus::Passed
    }
}

/// Aggregate outcome of one orchestrator run.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// Per-(job, version) results in completion order.
    pub results: Vec<JobResult>,
    /// Requested version specifiers that matched no installed interpreter.
    /// Their jobs were skipped; this does not fail the run by itself.
    pub unresolved: Vec<String>,
    /// The run was cancelled (watch-mode restart or external interruption).
    /// Distinct from failure; cancelled results are not reported as failed.
    pub cancelled: bool,
    pub duration: Duration,
}

impl RunResult {
    pub fn success(&self) -> bool {
        !self.cancelled && self.results.iter().all(JobResult::success)
    }
}
