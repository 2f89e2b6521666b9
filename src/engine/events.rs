// src/engine/events.rs

use crate::runtime::PythonVersion;
use crate::types::{JobResult, StepResult};

/// Progress notifications published while a run executes.
///
/// The engine produces these on an mpsc channel and never looks back at
/// them; what to display is entirely the presentation layer's decision.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Environment provisioning progress for one version.
    EnvProgress {
        version: PythonVersion,
        message: String,
    },
    /// The environment for one version is ready for use.
    EnvReady { version: PythonVersion },
    /// A (job, version) pair started executing.
    JobStarted {
        job: String,
        version: PythonVersion,
    },
    /// One step process was spawned.
    StepStarted {
        job: String,
        version: PythonVersion,
        cmd: String,
    },
    /// One step reached a terminal state.
    StepFinished {
        job: String,
        version: PythonVersion,
        result: StepResult,
    },
    /// A (job, version) pair reached a terminal state. `show_output` carries
    /// the job's flag so the renderer can dump captured output even on
    /// success.
    JobFinished {
        result: JobResult,
        show_output: bool,
    },
}
