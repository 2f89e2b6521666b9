// src/watch/supervisor.rs

//! The run/cancel/restart discipline of watch mode.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::debounce::drain_burst;

/// Drive runs until shutdown: start one run, and whenever the watched
/// paths change, cancel whatever is in flight and start exactly one new
/// run once the change burst settles.
///
/// `start_run` is invoked once per iteration with a fresh child token of
/// `shutdown`; the crate root passes a closure that reloads the
/// configuration and spawns an orchestrator run.
///
/// A change arriving while a run is in flight is never lost: the run races
/// against a bare `changes.recv()`, which is cancel safe, so the first
/// changed path survives the select even when the run finishes before the
/// debounce window closes. The surviving path then seeds the burst drain.
pub async fn supervise<S>(
    mut changes: mpsc::UnboundedReceiver<PathBuf>,
    shutdown: CancellationToken,
    window: Duration,
    mut start_run: S,
) where
    S: FnMut(CancellationToken) -> JoinHandle<()>,
{
    loop {
        let run_cancel = shutdown.child_token();
        let mut run = start_run(run_cancel.clone());

        let interrupted = tokio::select! {
            _ = &mut run => None,
            changed = changes.recv() => {
                let Some(path) = changed else {
                    // Watcher gone; let the run finish and stop.
                    let _ = run.await;
                    return;
                };
                info!(path = %path.display(), "file changed; cancelling run in flight");
                run_cancel.cancel();
                let _ = run.await;
                Some(path)
            }
            _ = shutdown.cancelled() => {
                let _ = run.await;
                return;
            }
        };

        // A run that finished on its own idles until the next change.
        let first = match interrupted {
            Some(path) => path,
            None => tokio::select! {
                changed = changes.recv() => match changed {
                    Some(path) => path,
                    None => return,
                },
                _ = shutdown.cancelled() => return,
            },
        };

        let burst = drain_burst(&mut changes, first, window).await;
        debug!(changes = burst.len(), "change burst settled; starting new run");
    }
}
