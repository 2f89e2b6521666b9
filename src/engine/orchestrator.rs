// src/engine/orchestrator.rs

//! The driver of one full run: plan, resolve, provision, fan out, aggregate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::exec::{self, RenderedJob};
use crate::plan::ExecutionPlan;
use crate::runtime::{Interpreter, InterpreterLocator, PythonVersion, VersionSpec};
use crate::types::{Job, JobName, JobResult, JobStatus, RunResult, StepResult};
use crate::venv::{EnvManager, EnvUpdate, Environment};

use super::events::RunEvent;
use super::scheduler::{Pair, PairScheduler};

/// Per-run mode flags, from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Skip the version matrix and use the active interpreter.
    pub live: bool,
    /// Pin the run to the single version matching this specifier.
    pub python: Option<VersionSpec>,
}

/// Drives one run end to end.
///
/// The orchestrator owns the run's configuration snapshot, the interpreter
/// locator, and the environment cache it injects into; nothing here is
/// global, so independent orchestrators (one per watch-mode iteration, many
/// in tests) never interfere.
pub struct Orchestrator {
    config: Config,
    options: RunOptions,
    locator: Arc<dyn InterpreterLocator>,
    envs: Arc<EnvManager>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        options: RunOptions,
        locator: Arc<dyn InterpreterLocator>,
        envs: Arc<EnvManager>,
    ) -> Self {
        Self {
            config,
            options,
            locator,
            envs,
        }
    }

    /// Execute `requested` jobs (or the configured defaults) across the
    /// selected versions.
    ///
    /// Configuration-level errors (unknown job, requires cycle, missing
    /// template value) abort before anything is provisioned or spawned.
    /// Everything scoped below that — an unresolved specifier, a version
    /// that fails to provision, a failing or unspawnable step — is recorded
    /// in the returned [`RunResult`] instead of propagating.
    pub async fn run(
        &self,
        requested: &[JobName],
        cancel: CancellationToken,
        events: mpsc::Sender<RunEvent>,
    ) -> Result<RunResult> {
        let started = Instant::now();

        let requested = if requested.is_empty() {
            self.config.default.clone()
        } else {
            requested.to_vec()
        };
        if requested.is_empty() {
            warn!("no jobs requested and no default jobs configured");
            return Ok(RunResult {
                duration: started.elapsed(),
                ..Default::default()
            });
        }

        // One plan per run; a malformed graph means zero execution.
        let plan = ExecutionPlan::build(&requested, &self.config.jobs)?;

        // Interpreter probes spawn blocking subprocesses; keep them off the
        // async threads.
        let (interpreters, unresolved) = {
            let locator = Arc::clone(&self.locator);
            let options = self.options.clone();
            let versions = self.config.versions.clone();
            let all_once = plan.all_once();
            tokio::task::spawn_blocking(move || {
                select_interpreters(&*locator, &options, &versions, all_once)
            })
            .await??
        };
        let unresolved: Vec<String> =
            unresolved.iter().map(|s| s.as_str().to_string()).collect();
        if interpreters.is_empty() {
            warn!("no usable python version; nothing to run");
            return Ok(RunResult {
                unresolved,
                duration: started.elapsed(),
                ..Default::default()
            });
        }

        let versions: Vec<PythonVersion> =
            interpreters.iter().map(|i| i.version.clone()).collect();
        info!(
            jobs = plan.len(),
            versions = ?versions.iter().map(|v| v.as_str()).collect::<Vec<_>>(),
            "starting run"
        );

        // Every command renders before anything spawns, so a missing value
        // aborts with no side effects.
        let rendered = self.render_all(&plan, &versions)?;

        let mut scheduler = PairScheduler::new(plan, versions.clone());
        let mut results: Vec<JobResult> = Vec::new();

        // Provision all selected versions up front, concurrently. A failed
        // version takes down only its own pairs.
        let environments = self
            .acquire_environments(&interpreters, &events, &cancel)
            .await;
        let mut usable: HashMap<PythonVersion, Environment> = HashMap::new();
        for (version, outcome) in environments {
            match outcome {
                Some(env) => {
                    usable.insert(version, env);
                }
                // Acquisition interrupted by cancellation: the run is
                // winding down, so its pairs are cancelled, not failed.
                None if cancel.is_cancelled() => {
                    let (interrupted, blocked) = scheduler.fail_version(&version);
                    for pair in interrupted.into_iter().chain(blocked) {
                        self.report(&mut results, &events, &rendered, pair, JobStatus::Cancelled)
                            .await;
                    }
                }
                None => {
                    let (failed, blocked) = scheduler.fail_version(&version);
                    for pair in failed {
                        self.report(&mut results, &events, &rendered, pair, JobStatus::Failed)
                            .await;
                    }
                    for pair in blocked {
                        self.report(&mut results, &events, &rendered, pair, JobStatus::Blocked)
                            .await;
                    }
                }
            }
        }

        // Dispatch loop: launch every ready pair, then wait for the next
        // completion. Cancellation stops new launches; in-flight steps see
        // the same token and wind down on their own.
        let mut inflight: JoinSet<JobResult> = JoinSet::new();
        loop {
            if !cancel.is_cancelled() {
                for pair in scheduler.take_ready() {
                    self.launch(&mut inflight, &rendered, &usable, &pair, &cancel, &events)
                        .await;
                }
            }

            match inflight.join_next().await {
                Some(Ok(result)) => {
                    let pair = Pair {
                        job: result.job.clone(),
                        version: result.version.clone(),
                    };
                    let blocked =
                        scheduler.record_completion(&pair, result.status == JobStatus::Passed);
                    self.publish(&mut results, &events, result).await;
                    for pair in blocked {
                        self.report(&mut results, &events, &rendered, pair, JobStatus::Blocked)
                            .await;
                    }
                }
                Some(Err(err)) => {
                    error!(error = %err, "job task panicked");
                }
                None => break,
            }
        }

        let cancelled = cancel.is_cancelled();
        if cancelled {
            info!("run cancelled");
        }
        debug!(done = scheduler.is_done(), results = results.len(), "run finished");

        Ok(RunResult {
            results,
            unresolved,
            cancelled,
            duration: started.elapsed(),
        })
    }

    /// Render every (job × applicable version) command. `python_version` is
    /// implicitly defined per version on top of the configured values.
    fn render_all(
        &self,
        plan: &ExecutionPlan,
        versions: &[PythonVersion],
    ) -> Result<HashMap<Pair, Vec<String>>> {
        let highest = &versions[0];
        let mut rendered = HashMap::new();

        for version in versions {
            let mut values = self.config.values.clone();
            values.insert("python_version".to_string(), version.as_str().to_string());

            for job in plan.jobs() {
                if job.once && version != highest {
                    continue;
                }
                let cmds: Vec<String> = job
                    .run
                    .iter()
                    .map(|template| exec::render(template, &values))
                    .collect::<Result<_, _>>()?;
                rendered.insert(
                    Pair {
                        job: job.name.clone(),
                        version: version.clone(),
                    },
                    cmds,
                );
            }
        }
        Ok(rendered)
    }

    /// Acquire one environment per interpreter, concurrently. Returns `None`
    /// for versions whose provisioning failed or was cancelled.
    async fn acquire_environments(
        &self,
        interpreters: &[Interpreter],
        events: &mpsc::Sender<RunEvent>,
        cancel: &CancellationToken,
    ) -> Vec<(PythonVersion, Option<Environment>)> {
        // Bridge the manager's update channel onto the run event stream.
        let (update_tx, mut update_rx) = mpsc::channel::<EnvUpdate>(32);
        let forward = {
            let events = events.clone();
            tokio::spawn(async move {
                while let Some(update) = update_rx.recv().await {
                    let event = match update {
                        EnvUpdate::Progress { version, message } => {
                            RunEvent::EnvProgress { version, message }
                        }
                        EnvUpdate::Ready { version } => RunEvent::EnvReady { version },
                    };
                    let _ = events.send(event).await;
                }
            })
        };

        let mut acquisitions: JoinSet<(PythonVersion, Option<Environment>)> = JoinSet::new();
        for interpreter in interpreters {
            let envs = Arc::clone(&self.envs);
            let interpreter = interpreter.clone();
            let update_tx = update_tx.clone();
            let cancel = cancel.clone();
            acquisitions.spawn(async move {
                let version = interpreter.version.clone();
                tokio::select! {
                    outcome = envs.acquire(&interpreter, &update_tx) => match outcome {
                        Ok(env) => (version, Some(env)),
                        Err(err) => {
                            error!(version = %version, error = %err, "environment provisioning failed");
                            (version, None)
                        }
                    },
                    _ = cancel.cancelled() => (version, None),
                }
            });
        }
        drop(update_tx);

        let mut environments = Vec::new();
        while let Some(joined) = acquisitions.join_next().await {
            match joined {
                Ok(entry) => environments.push(entry),
                Err(err) => error!(error = %err, "environment acquisition task panicked"),
            }
        }
        let _ = forward.await;
        environments
    }

    /// Spawn one job runner for a ready pair.
    async fn launch(
        &self,
        inflight: &mut JoinSet<JobResult>,
        rendered: &HashMap<Pair, Vec<String>>,
        usable: &HashMap<PythonVersion, Environment>,
        pair: &Pair,
        cancel: &CancellationToken,
        events: &mpsc::Sender<RunEvent>,
    ) {
        let Some(env) = usable.get(&pair.version) else {
            // fail_version already reported everything on a dead version.
            return;
        };
        let Some(job) = self.config.jobs.get(&pair.job) else {
            return;
        };

        let _ = events
            .send(RunEvent::JobStarted {
                job: pair.job.clone(),
                version: pair.version.clone(),
            })
            .await;

        let job = RenderedJob {
            name: pair.job.clone(),
            version: pair.version.clone(),
            steps: rendered.get(pair).cloned().unwrap_or_default(),
            parallel: job.parallel,
        };
        inflight.spawn(exec::run_job(
            job,
            env.clone(),
            cancel.clone(),
            events.clone(),
        ));
    }

    /// Record a pair that never executed (failed version or blocked), with
    /// its steps registered as not-run.
    async fn report(
        &self,
        results: &mut Vec<JobResult>,
        events: &mpsc::Sender<RunEvent>,
        rendered: &HashMap<Pair, Vec<String>>,
        pair: Pair,
        status: JobStatus,
    ) {
        let steps = rendered
            .get(&pair)
            .map(|cmds| cmds.iter().map(StepResult::not_run).collect())
            .unwrap_or_default();
        let result = JobResult {
            job: pair.job,
            version: pair.version,
            steps,
            status,
            duration: std::time::Duration::ZERO,
        };
        self.publish(results, events, result).await;
    }

    async fn publish(
        &self,
        results: &mut Vec<JobResult>,
        events: &mpsc::Sender<RunEvent>,
        result: JobResult,
    ) {
        let show_output = self
            .config
            .jobs
            .get(&result.job)
            .map(|job: &Job| job.show_output)
            .unwrap_or(false);
        let _ = events
            .send(RunEvent::JobFinished {
                result: result.clone(),
                show_output,
            })
            .await;
        results.push(result);
    }
}

/// Pick the interpreters for a run: the active one in live mode, the single
/// pinned match with `--python`, otherwise the configured matrix (or, absent
/// one, the active interpreter again). An all-`once` plan collapses the
/// matrix to its highest version.
fn select_interpreters(
    locator: &dyn InterpreterLocator,
    options: &RunOptions,
    configured: &[String],
    all_once: bool,
) -> Result<(Vec<Interpreter>, Vec<VersionSpec>)> {
    if options.live {
        let active = locator
            .active()
            .ok_or_else(|| anyhow!("no active python interpreter found on PATH"))?;
        return Ok((vec![active], Vec::new()));
    }

    if let Some(spec) = &options.python {
        let resolution = locator.resolve(std::slice::from_ref(spec));
        return Ok((resolution.interpreters, resolution.unresolved));
    }

    if configured.is_empty() {
        let active = locator
            .active()
            .ok_or_else(|| anyhow!("no active python interpreter found on PATH"))?;
        return Ok((vec![active], Vec::new()));
    }

    let specs: Vec<VersionSpec> = configured.iter().filter_map(|raw| raw.parse().ok()).collect();
    let resolution = locator.resolve(&specs);
    let mut interpreters = resolution.interpreters;
    if all_once && interpreters.len() > 1 {
        interpreters.truncate(1);
    }
    Ok((interpreters, resolution.unresolved))
}
