// src/engine/mod.rs

//! Orchestration engine for jobx.
//!
//! This module ties together:
//! - the (job, version) pair scheduler that enforces dependency order per
//!   version and `once` semantics
//! - the orchestrator that drives a full run: plan, resolve interpreters,
//!   provision environments, fan job runners out, aggregate the result
//! - the run event stream consumed by the presentation layer

pub mod events;
pub mod orchestrator;
pub mod scheduler;

pub use events::RunEvent;
pub use orchestrator::{Orchestrator, RunOptions};
pub use scheduler::{Pair, PairScheduler};
