// src/exec/job.rs

//! Execution of one job's steps on one environment.

use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::RunEvent;
use crate::runtime::PythonVersion;
use crate::types::{JobName, JobResult, JobStatus, StepResult, StepStatus};
use crate::venv::Environment;

use super::step::run_command;

/// One job with its commands already rendered for a specific version.
///
/// Produced by the orchestrator during pre-rendering; by the time a job
/// reaches the runner there are no placeholders left to fail on.
#[derive(Debug, Clone)]
pub struct RenderedJob {
    pub name: JobName,
    pub version: PythonVersion,
    /// Fully rendered commands, in declaration order.
    pub steps: Vec<String>,
    pub parallel: bool,
}

/// Run all steps of `job` inside `env` and aggregate the outcome.
///
/// Sequential jobs stop at the first failing step; the remaining steps are
/// recorded as not-run. Parallel jobs fan every step out at once and join
/// them all regardless of individual failures, keeping results in
/// declaration order. The reported duration is the wall-clock span of the
/// whole job either way.
///
/// A step whose process cannot be spawned becomes a failed step result; it
/// never aborts sibling steps or other (job, version) pairs.
pub async fn run_job(
    job: RenderedJob,
    env: Environment,
    cancel: CancellationToken,
    events: mpsc::Sender<RunEvent>,
) -> JobResult {
    let started = Instant::now();

    let steps = if job.parallel {
        run_parallel(&job, &env, &cancel, &events).await
    } else {
        run_sequential(&job, &env, &cancel, &events).await
    };

    let status = aggregate_status(&steps);
    debug!(job = %job.name, version = %job.version, ?status, "job finished");

    JobResult {
        job: job.name,
        version: job.version,
        steps,
        status,
        duration: started.elapsed(),
    }
}

/// Strictly ordered execution with first-failure short-circuit.
///
/// Steps skipped because an earlier step failed are not-run; steps skipped
/// because the run was cancelled are cancelled, so the aggregate never
/// reads a cancellation as a failure.
async fn run_sequential(
    job: &RenderedJob,
    env: &Environment,
    cancel: &CancellationToken,
    events: &mpsc::Sender<RunEvent>,
) -> Vec<StepResult> {
    let mut results = Vec::with_capacity(job.steps.len());
    let mut stopped = false;

    for cmd in &job.steps {
        if stopped {
            results.push(StepResult::not_run(cmd));
            continue;
        }
        if cancel.is_cancelled() {
            results.push(StepResult::cancelled(cmd, std::time::Duration::ZERO));
            continue;
        }
        let result = run_step(job, cmd, env, cancel, events).await;
        if !result.success() {
            stopped = true;
        }
        results.push(result);
    }

    results
}

/// All steps at once; every member joins before the job reports.
async fn run_parallel(
    job: &RenderedJob,
    env: &Environment,
    cancel: &CancellationToken,
    events: &mpsc::Sender<RunEvent>,
) -> Vec<StepResult> {
    let handles: Vec<(String, JoinHandle<StepResult>)> = job
        .steps
        .iter()
        .cloned()
        .map(|cmd| {
            let job = job.clone();
            let task_cmd = cmd.clone();
            let env = env.clone();
            let cancel = cancel.clone();
            let events = events.clone();
            let handle = tokio::spawn(async move {
                run_step(&job, &task_cmd, &env, &cancel, &events).await
            });
            (cmd, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (cmd, handle) in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(err) => {
                warn!(job = %job.name, cmd = %cmd, error = %err, "step task panicked");
                results.push(StepResult::spawn_failed(cmd, err));
            }
        }
    }
    results
}

/// Run one step, downgrading a spawn failure to a failed result, and publish
/// its start and outcome on the event stream.
async fn run_step(
    job: &RenderedJob,
    cmd: &str,
    env: &Environment,
    cancel: &CancellationToken,
    events: &mpsc::Sender<RunEvent>,
) -> StepResult {
    let _ = events
        .send(RunEvent::StepStarted {
            job: job.name.clone(),
            version: job.version.clone(),
            cmd: cmd.to_string(),
        })
        .await;

    let result = match run_command(cmd, env, true, cancel).await {
        Ok(result) => result,
        Err(err) => {
            warn!(job = %job.name, version = %job.version, error = %err, "spawn failed");
            StepResult::spawn_failed(cmd, err)
        }
    };

    let _ = events
        .send(RunEvent::StepFinished {
            job: job.name.clone(),
            version: job.version.clone(),
            result: result.clone(),
        })
        .await;

    result
}

/// Cancellation beats failure: a job cut short reports cancelled, not failed.
fn aggregate_status(steps: &[StepResult]) -> JobStatus {
    if steps
        .iter()
        .any(|s| matches!(s.status, StepStatus::Cancelled))
    {
        JobStatus::Cancelled
    } else if steps.iter().all(StepResult::success) {
        JobStatus::Passed
    } else {
        JobStatus::Failed
    }
}
