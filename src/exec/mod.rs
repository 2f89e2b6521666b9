// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the commands defined in
//! the jobs, using `tokio::process::Command`, and reporting progress to the
//! orchestration engine via `RunEvent`s.
//!
//! - [`template`] renders `{placeholder}` command templates against the
//!   configured values.
//! - [`step`] spawns one rendered command inside an environment and captures
//!   its result.
//! - [`job`] drives one job's steps on one environment, sequentially or as a
//!   parallel fan-out.

pub mod job;
pub mod step;
pub mod template;

pub use job::{run_job, RenderedJob};
pub use step::run_command;
pub use template::render;
