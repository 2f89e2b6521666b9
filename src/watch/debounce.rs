// src/watch/debounce.rs

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

/// Quiet window after the last change before a trigger fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// Wait for the next burst of filesystem changes, coalesced into a single
/// trigger.
///
/// Blocks until at least one change arrives, then keeps accumulating until
/// `window` passes with no further changes. Saves, formatters, and branch
/// switches that touch many files therefore produce one trigger, not one
/// per file. Returns `None` once the change channel closes.
pub async fn next_trigger(
    changes: &mut mpsc::UnboundedReceiver<PathBuf>,
    window: Duration,
) -> Option<Vec<PathBuf>> {
    let first = changes.recv().await?;
    Some(drain_burst(changes, first, window).await)
}

/// Accumulate further changes onto `first` until `window` passes with none.
///
/// Split out of [`next_trigger`] so a caller that already holds the first
/// changed path (because it raced the receive against something else) can
/// still coalesce the rest of the burst.
pub async fn drain_burst(
    changes: &mut mpsc::UnboundedReceiver<PathBuf>,
    first: PathBuf,
    window: Duration,
) -> Vec<PathBuf> {
    let mut paths = vec![first];

    loop {
        match tokio::time::timeout(window, changes.recv()).await {
            Ok(Some(path)) => paths.push(path),
            // Channel closed; flush what we have.
            Ok(None) => break,
            // Quiet window elapsed.
            Err(_) => break,
        }
    }

    debug!(changes = paths.len(), "debounced change burst into one trigger");
    paths
}
