// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! NOTE: this expects `clap` to be built with the `derive` feature, e.g.:
//! `clap = { version = "4.5.53", features = ["derive"] }` in `Cargo.toml`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `jobx`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobx",
    version,
    about = "Run configured jobs across a matrix of Python versions.",
    long_about = None
)]
pub struct CliArgs {
    /// Jobs to run, in order. Defaults to the `default` list from the
    /// config file.
    #[arg(value_name = "JOBS")]
    pub jobs: Vec<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Jobx.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Jobx.toml")]
    pub config: String,

    /// Run jobs only on the single version matching this specifier,
    /// skipping the rest of the matrix.
    #[arg(short = 'p', long, value_name = "VERSION", conflicts_with = "live")]
    pub python: Option<String>,

    /// Skip the version matrix and run on the active interpreter.
    #[arg(long)]
    pub live: bool,

    /// Watch the configured paths and re-run jobs on changes.
    #[arg(short = 'w', long)]
    pub watch: bool,

    /// Remove all managed environments before doing anything else.
    #[arg(long)]
    pub clean: bool,

    /// Print the configured jobs and exit.
    #[arg(long)]
    pub list: bool,

    /// Print per-job timings after the run.
    #[arg(long)]
    pub benchmark: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBX_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
