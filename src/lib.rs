// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod plan;
pub mod render;
pub mod runtime;
pub mod types;
pub mod venv;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::CliArgs;
use crate::config::{load_and_validate, Config};
use crate::engine::{Orchestrator, RunOptions};
use crate::runtime::{InterpreterLocator, PathLocator, VersionSpec};
use crate::types::RunResult;
use crate::venv::{EnvManager, PipProvisioner};
use crate::watch::{spawn_watcher, supervise, IgnoreProfile, DEBOUNCE_WINDOW};

/// High-level entry point used by `main.rs`.
///
/// Wires together config loading, the orchestrator, the renderer, and (in
/// watch mode) the file watcher. Returns whether the invocation should exit
/// zero; a cancelled run counts as clean, never as failed.
pub async fn run(args: CliArgs) -> Result<bool> {
    let config_path = PathBuf::from(&args.config);
    let config = load_and_validate(&config_path)?;

    let requested: Vec<String> = args.jobs.iter().map(|j| j.to_lowercase()).collect();

    if args.clean {
        let envs = EnvManager::new(&config, Arc::new(PipProvisioner));
        envs.clean()?;
        if requested.is_empty() && config.default.is_empty() && !args.list {
            return Ok(true);
        }
    }

    if args.list {
        render::print_job_list(&config);
        return Ok(true);
    }

    let options = RunOptions {
        live: args.live,
        python: args
            .python
            .as_deref()
            .map(|raw| {
                raw.parse::<VersionSpec>()
                    .map_err(|e| anyhow!("invalid --python value '{raw}': {e}"))
            })
            .transpose()?,
    };
    let locator: Arc<dyn InterpreterLocator> = Arc::new(PathLocator::new());

    if args.watch {
        watch_loop(config_path, config, requested, options, locator, args.benchmark).await?;
        return Ok(true);
    }

    // Ctrl-C → cooperative cancellation of the single run.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let result = run_once(config, requested, options, locator, cancel).await?;
    render::print_summary(&result, args.benchmark);
    Ok(result.success() || result.cancelled)
}

/// One orchestrator invocation with its own environment cache, event
/// channel, and renderer.
async fn run_once(
    config: Config,
    requested: Vec<String>,
    options: RunOptions,
    locator: Arc<dyn InterpreterLocator>,
    cancel: CancellationToken,
) -> Result<RunResult> {
    let envs = Arc::new(EnvManager::new(&config, Arc::new(PipProvisioner)));
    let orchestrator = Orchestrator::new(config, options, locator, envs);

    let (events_tx, events_rx) = mpsc::channel(64);
    let renderer = tokio::spawn(render::render_events(events_rx));

    let result = orchestrator.run(&requested, cancel, events_tx).await;
    let _ = renderer.await;
    result
}

/// Watch mode: run, then cancel and re-run with a freshly loaded
/// configuration whenever the watched paths change. Runs until Ctrl-C.
async fn watch_loop(
    config_path: PathBuf,
    config: Config,
    requested: Vec<String>,
    options: RunOptions,
    locator: Arc<dyn InterpreterLocator>,
    benchmark: bool,
) -> Result<()> {
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    // The watcher outlives individual runs; only the job configuration is
    // reloaded between them.
    let profile = IgnoreProfile::build(&config.watch_exclude)?;
    let (_watcher, changes) = spawn_watcher(config.root.clone(), &config.watch_paths, profile)?;

    let mut current = config;
    let mut first_run = true;
    supervise(changes, shutdown, DEBOUNCE_WINDOW, move |cancel| {
        if !first_run {
            match load_and_validate(&config_path) {
                Ok(fresh) => current = fresh,
                Err(err) => {
                    warn!(error = %err, "config reload failed; keeping previous configuration");
                }
            }
        }
        first_run = false;
        start_run(
            current.clone(),
            requested.clone(),
            options.clone(),
            locator.clone(),
            cancel,
            benchmark,
        )
    })
    .await;
    Ok(())
}

/// Spawn one watch-mode run. The task prints the summary itself unless the
/// run was cancelled, whose results are discarded.
fn start_run(
    config: Config,
    requested: Vec<String>,
    options: RunOptions,
    locator: Arc<dyn InterpreterLocator>,
    cancel: CancellationToken,
    benchmark: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match run_once(config, requested, options, locator, cancel).await {
            Ok(result) => {
                if !result.cancelled {
                    render::print_summary(&result, benchmark);
                }
            }
            Err(err) => {
                eprintln!("jobx error: {err:?}");
            }
        }
    })
}
