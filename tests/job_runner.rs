use std::error::Error;
use std::time::Duration;

use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use jobx::engine::RunEvent;
use jobx::exec::{run_job, RenderedJob};
use jobx::types::{JobStatus, StepStatus};
use jobx::venv::Environment;

type TestResult = Result<(), Box<dyn Error>>;

fn test_env(dir: &std::path::Path) -> Environment {
    let venv = dir.join("venv");
    let mut env = Environment {
        version: "3.11.4".parse().expect("valid version"),
        venv,
        python: std::path::PathBuf::new(),
    };
    env.python = env.bin_dir().join("python");
    env
}

fn rendered(steps: &[&str], parallel: bool) -> RenderedJob {
    RenderedJob {
        name: "job".to_string(),
        version: "3.11.4".parse().expect("valid version"),
        steps: steps.iter().map(|s| s.to_string()).collect(),
        parallel,
    }
}

fn events() -> (mpsc::Sender<RunEvent>, mpsc::Receiver<RunEvent>) {
    mpsc::channel(256)
}

#[tokio::test]
async fn sequential_job_stops_at_first_failure() -> TestResult {
    let dir = tempdir()?;
    let (tx, _rx) = events();

    let result = run_job(
        rendered(&["false", "echo never"], false),
        test_env(dir.path()),
        CancellationToken::new(),
        tx,
    )
    .await;

    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(result.steps.len(), 2);
    assert_eq!(result.steps[0].status, StepStatus::Exited(1));
    assert_eq!(result.steps[1].status, StepStatus::NotRun);

    Ok(())
}

#[tokio::test]
async fn sequential_job_passes_when_all_steps_succeed() -> TestResult {
    let dir = tempdir()?;
    let (tx, _rx) = events();

    let result = run_job(
        rendered(&["echo one", "echo two"], false),
        test_env(dir.path()),
        CancellationToken::new(),
        tx,
    )
    .await;

    assert_eq!(result.status, JobStatus::Passed);
    assert!(result.steps.iter().all(|s| s.success()));
    assert_eq!(result.steps[0].stdout.trim(), "one");
    assert_eq!(result.steps[1].stdout.trim(), "two");

    Ok(())
}

#[tokio::test]
async fn parallel_job_runs_every_step_despite_failures() -> TestResult {
    let dir = tempdir()?;
    let (tx, _rx) = events();

    let result = run_job(
        rendered(&["false", "echo survivor"], true),
        test_env(dir.path()),
        CancellationToken::new(),
        tx,
    )
    .await;

    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(result.steps.len(), 2);
    // Both steps ran to completion, in declaration order.
    assert_eq!(result.steps[0].status, StepStatus::Exited(1));
    assert_eq!(result.steps[1].status, StepStatus::Exited(0));
    assert_eq!(result.steps[1].stdout.trim(), "survivor");

    Ok(())
}

#[tokio::test]
async fn missing_executable_fails_the_step_not_the_siblings() -> TestResult {
    let dir = tempdir()?;
    let (tx, _rx) = events();

    let result = run_job(
        rendered(&["definitely-not-a-real-tool-4217", "echo fine"], true),
        test_env(dir.path()),
        CancellationToken::new(),
        tx,
    )
    .await;

    assert_eq!(result.status, JobStatus::Failed);
    assert!(!result.steps[0].success());
    assert_eq!(result.steps[1].status, StepStatus::Exited(0));

    Ok(())
}

#[tokio::test]
async fn cancellation_kills_the_step_and_reports_cancelled() -> TestResult {
    let dir = tempdir()?;
    let (tx, _rx) = events();
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let result = run_job(
        rendered(&["sleep 30"], false),
        test_env(dir.path()),
        cancel,
        tx,
    )
    .await;

    assert_eq!(result.status, JobStatus::Cancelled);
    assert_eq!(result.steps[0].status, StepStatus::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(10));

    Ok(())
}

#[tokio::test]
async fn cancellation_before_the_first_step_reports_cancelled_not_failed() -> TestResult {
    let dir = tempdir()?;
    let (tx, _rx) = events();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = run_job(
        rendered(&["echo one", "echo two"], false),
        test_env(dir.path()),
        cancel,
        tx,
    )
    .await;

    assert_eq!(result.status, JobStatus::Cancelled);
    assert!(result
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Cancelled));

    Ok(())
}

#[tokio::test]
async fn step_events_are_published_in_order() -> TestResult {
    let dir = tempdir()?;
    let (tx, mut rx) = events();

    let result = run_job(
        rendered(&["echo hello"], false),
        test_env(dir.path()),
        CancellationToken::new(),
        tx,
    )
    .await;
    assert_eq!(result.status, JobStatus::Passed);

    let first = rx.recv().await.expect("step started event");
    assert!(matches!(first, RunEvent::StepStarted { ref cmd, .. } if cmd == "echo hello"));
    let second = rx.recv().await.expect("step finished event");
    match second {
        RunEvent::StepFinished { result, .. } => assert!(result.success()),
        other => panic!("expected StepFinished, got {other:?}"),
    }

    Ok(())
}
