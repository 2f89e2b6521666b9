// src/watch/mod.rs

//! File watching for live mode.
//!
//! This module is responsible for:
//! - Compiling the ignore glob patterns (built-ins plus `watch_exclude`).
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Coalescing bursts of change events into single triggers (debounce).
//!
//! - Supervising runs: cancelling the one in flight and starting exactly
//!   one new run per trigger (`supervisor`), behind a run-factory closure
//!   so it knows nothing about jobs or configuration.

pub mod debounce;
pub mod patterns;
pub mod supervisor;
pub mod watcher;

pub use debounce::{drain_burst, next_trigger, DEBOUNCE_WINDOW};
pub use patterns::{IgnoreProfile, BUILTIN_IGNORES};
pub use supervisor::supervise;
pub use watcher::{spawn_watcher, WatcherHandle};
