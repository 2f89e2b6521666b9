// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::watch::patterns::IgnoreProfile;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive
/// for as long as needed. Dropping this handle stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Start watching `paths` (relative to `root`; empty means the root itself)
/// and return the handle plus a channel of changed paths.
///
/// Changed paths are relativized against the root and filtered through the
/// ignore profile before they reach the channel; the receiver only ever
/// sees changes a run should react to. Coalescing bursts into triggers is
/// the caller's job via [`super::debounce::next_trigger`].
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    paths: &[PathBuf],
    profile: IgnoreProfile,
) -> Result<(WatcherHandle, mpsc::UnboundedReceiver<PathBuf>)> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // We can't log via tracing here easily, so fall back to stderr.
                    eprintln!("jobx: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("jobx: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    if paths.is_empty() {
        watcher.watch(&root, RecursiveMode::Recursive)?;
    } else {
        for path in paths {
            let target = root.join(path);
            watcher.watch(&target, RecursiveMode::Recursive)?;
        }
    }

    info!(root = %root.display(), "file watcher started");

    // Async task that relativizes, filters, and forwards changed paths.
    let (change_tx, change_rx) = mpsc::unbounded_channel::<PathBuf>();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "received notify event");

            for path in &event.paths {
                let Some(rel) = relative_str(&root, path) else {
                    warn!(path = %path.display(), root = %root.display(), "could not relativize changed path");
                    continue;
                };
                if profile.is_ignored(&rel) {
                    debug!(path = %rel, "ignored changed path");
                    continue;
                }
                if change_tx.send(PathBuf::from(rel)).is_err() {
                    // Receiver dropped; no point keeping this loop alive.
                    return;
                }
            }
        }

        debug!("file watcher loop ended");
    });

    Ok((WatcherHandle { _inner: watcher }, change_rx))
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path is not under `root` and cannot be relativized.
fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let s = rel.to_string_lossy().replace('\\', "/");
    Some(s)
}
