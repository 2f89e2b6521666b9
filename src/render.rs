// src/render.rs

//! Plain-line rendering of run events and results.
//!
//! The renderer consumes the engine's event stream and prints; it never
//! feeds anything back into the engine. Failed steps always dump their
//! captured output, `show_output` jobs dump it even on success.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::engine::RunEvent;
use crate::types::{JobResult, JobStatus, RunResult, StepResult, StepStatus};

/// Print run events as they arrive until the channel closes.
pub async fn render_events(mut events: mpsc::Receiver<RunEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            RunEvent::EnvProgress { version, message } => {
                println!("python {version}: {message}...");
            }
            RunEvent::EnvReady { version } => {
                println!("python {version}: environment ready");
            }
            RunEvent::JobFinished {
                result,
                show_output,
            } => {
                print_job(&result, show_output);
            }
            // Step-level events stay quiet here; failures are dumped with
            // their job once it finishes.
            RunEvent::JobStarted { .. }
            | RunEvent::StepStarted { .. }
            | RunEvent::StepFinished { .. } => {}
        }
    }
}

fn print_job(result: &JobResult, show_output: bool) {
    let label = match result.status {
        JobStatus::Passed => "ok",
        JobStatus::Failed => "FAIL",
        JobStatus::Blocked => "blocked",
        JobStatus::Cancelled => "cancelled",
    };
    println!(
        "[{}] {} {} ({})",
        result.version,
        result.job,
        label,
        human_duration(result.duration)
    );

    let dump_all = show_output && result.status == JobStatus::Passed;
    for step in &result.steps {
        match step.status {
            StepStatus::Exited(code) if code != 0 => {
                println!("  $ {} (exit {code})", step.cmd);
                dump_output(step);
            }
            StepStatus::Exited(_) if dump_all => {
                println!("  $ {}", step.cmd);
                dump_output(step);
            }
            _ => {}
        }
    }
}

fn dump_output(step: &StepResult) {
    for line in step.stdout.lines() {
        println!("  | {line}");
    }
    for line in step.stderr.lines() {
        println!("  ! {line}");
    }
}

/// Print the run trailer: per-job tallies, total duration, and with
/// `benchmark` the individual (job, version) timings sorted slowest first.
pub fn print_summary(result: &RunResult, benchmark: bool) {
    for spec in &result.unresolved {
        println!("warning: no python matching '{spec}' found; its jobs were skipped");
    }

    if result.cancelled {
        println!("CANCELLED after {}", human_duration(result.duration));
        return;
    }

    if benchmark {
        let mut timed: Vec<&JobResult> = result.results.iter().collect();
        timed.sort_by(|a, b| b.duration.cmp(&a.duration));
        for job in timed {
            println!(
                "  {:>9}  [{}] {}",
                human_duration(job.duration),
                job.version,
                job.job
            );
        }
    }

    let failed = result
        .results
        .iter()
        .filter(|r| r.status == JobStatus::Failed)
        .count();
    let blocked = result
        .results
        .iter()
        .filter(|r| r.status == JobStatus::Blocked)
        .count();

    if result.success() {
        println!(
            "OK: {} jobs in {}",
            result.results.len(),
            human_duration(result.duration)
        );
    } else {
        println!(
            "FAIL: {failed} failed, {blocked} blocked of {} jobs in {}",
            result.results.len(),
            human_duration(result.duration)
        );
    }
}

/// Print the configured jobs and their commands, for `--list`.
pub fn print_job_list(config: &Config) {
    for (name, job) in &config.jobs {
        let mut notes = Vec::new();
        if !job.requires.is_empty() {
            notes.push(format!("requires {}", job.requires.join(", ")));
        }
        if job.once {
            notes.push("once".to_string());
        }
        if job.parallel {
            notes.push("parallel".to_string());
        }
        if notes.is_empty() {
            println!("{name}:");
        } else {
            println!("{name} ({}):", notes.join("; "));
        }
        for cmd in &job.run {
            println!("  {cmd}");
        }
    }
}

fn human_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        format!("{}m{:02}s", duration.as_secs() / 60, duration.as_secs() % 60)
    }
}
