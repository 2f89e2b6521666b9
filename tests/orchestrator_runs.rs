use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use jobx::config::Config;
use jobx::engine::{Orchestrator, RunEvent, RunOptions};
use jobx::errors::ProvisionError;
use jobx::runtime::{Interpreter, InterpreterLocator, Resolution, VersionSpec};
use jobx::types::{Job, JobResult, JobStatus, RunResult};
use jobx::venv::{EnvManager, EnvUpdate, Environment, Provisioner};

type TestResult = Result<(), Box<dyn Error>>;

/// Locator with a canned set of installed interpreters.
struct FakeLocator {
    installed: Vec<Interpreter>,
}

impl FakeLocator {
    fn new(versions: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            installed: versions
                .iter()
                .map(|v| Interpreter {
                    version: v.parse().expect("valid version"),
                    path: PathBuf::from("/usr/bin/true"),
                })
                .collect(),
        })
    }
}

impl InterpreterLocator for FakeLocator {
    fn resolve(&self, specs: &[VersionSpec]) -> Resolution {
        let mut resolution = Resolution::default();
        for spec in specs {
            match self.installed.iter().find(|i| spec.matches(&i.version)) {
                Some(interp) => resolution.interpreters.push(interp.clone()),
                None => resolution.unresolved.push(spec.clone()),
            }
        }
        resolution
            .interpreters
            .sort_by(|a, b| b.version.cmp(&a.version));
        resolution
    }

    fn active(&self) -> Option<Interpreter> {
        self.installed.first().cloned()
    }
}

/// Provisioner that lays down the minimal venv skeleton without pip.
struct FakeProvisioner;

impl Provisioner for FakeProvisioner {
    fn provision<'a>(
        &'a self,
        _interpreter: &'a Interpreter,
        env: &'a Environment,
        _requirements: &'a [PathBuf],
        _project_root: &'a Path,
        _updates: &'a mpsc::Sender<EnvUpdate>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProvisionError>> + Send + 'a>> {
        Box::pin(async move {
            let bin = env.bin_dir();
            fs::create_dir_all(&bin).map_err(|e| ProvisionError {
                version: env.version.to_string(),
                reason: e.to_string(),
            })?;
            fs::write(&env.python, "").map_err(|e| ProvisionError {
                version: env.version.to_string(),
                reason: e.to_string(),
            })?;
            Ok(())
        })
    }
}

/// Provisioner that refuses one version and defers to the fake for the rest.
struct FailingProvisioner {
    refuse: String,
}

impl Provisioner for FailingProvisioner {
    fn provision<'a>(
        &'a self,
        interpreter: &'a Interpreter,
        env: &'a Environment,
        requirements: &'a [PathBuf],
        project_root: &'a Path,
        updates: &'a mpsc::Sender<EnvUpdate>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProvisionError>> + Send + 'a>> {
        Box::pin(async move {
            if env.version.as_str() == self.refuse {
                return Err(ProvisionError {
                    version: env.version.to_string(),
                    reason: "refused by test".to_string(),
                });
            }
            FakeProvisioner
                .provision(interpreter, env, requirements, project_root, updates)
                .await
        })
    }
}

/// Provisioner that never finishes; acquisition ends only by cancellation.
struct StallingProvisioner;

impl Provisioner for StallingProvisioner {
    fn provision<'a>(
        &'a self,
        _interpreter: &'a Interpreter,
        _env: &'a Environment,
        _requirements: &'a [PathBuf],
        _project_root: &'a Path,
        _updates: &'a mpsc::Sender<EnvUpdate>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProvisionError>> + Send + 'a>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
    }
}

fn config(root: &Path, versions: &[&str], jobs: Vec<Job>) -> Config {
    Config {
        root: root.to_path_buf(),
        jobs: jobs.into_iter().map(|j| (j.name.clone(), j)).collect(),
        versions: versions.iter().map(|v| v.to_string()).collect(),
        requirements: Some(Vec::new()),
        values: BTreeMap::new(),
        ..Default::default()
    }
}

fn job(name: &str, run: &[&str]) -> Job {
    Job::new(name, run.iter().map(|r| r.to_string()).collect())
}

async fn run_orchestrator(
    config: Config,
    locator: Arc<dyn InterpreterLocator>,
    provisioner: Arc<dyn Provisioner>,
    requested: &[&str],
    cancel: CancellationToken,
) -> anyhow::Result<RunResult> {
    let envs = Arc::new(EnvManager::new(&config, provisioner));
    let orchestrator = Orchestrator::new(config, RunOptions::default(), locator, envs);

    let (tx, mut rx) = mpsc::channel::<RunEvent>(64);
    let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

    let requested: Vec<String> = requested.iter().map(|r| r.to_string()).collect();
    let result = orchestrator.run(&requested, cancel, tx).await;
    let _ = drain.await;
    result
}

fn find<'a>(result: &'a RunResult, job: &str, version: &str) -> &'a JobResult {
    result
        .results
        .iter()
        .find(|r| r.job == job && r.version.as_str() == version)
        .unwrap_or_else(|| panic!("no result for ({job}, {version})"))
}

#[tokio::test]
async fn failure_on_one_version_blocks_dependents_there_only() -> TestResult {
    let dir = tempdir()?;
    let mut b = job("b", &["echo b-{python_version}"]);
    b.requires = vec!["a".to_string()];
    let cfg = config(
        dir.path(),
        &["3.9", "3.10"],
        vec![
            // Fails on 3.9, passes on 3.10.
            job("a", &["test {python_version} = 3.10.2"]),
            b,
        ],
    );

    let result = run_orchestrator(
        cfg,
        FakeLocator::new(&["3.10.2", "3.9.18"]),
        Arc::new(FakeProvisioner),
        &["b"],
        CancellationToken::new(),
    )
    .await?;

    assert!(!result.success());
    assert_eq!(result.results.len(), 4);
    assert_eq!(find(&result, "a", "3.10.2").status, JobStatus::Passed);
    assert_eq!(find(&result, "b", "3.10.2").status, JobStatus::Passed);
    assert_eq!(find(&result, "a", "3.9.18").status, JobStatus::Failed);
    assert_eq!(find(&result, "b", "3.9.18").status, JobStatus::Blocked);

    Ok(())
}

#[tokio::test]
async fn once_job_executes_exactly_once_on_the_highest_version() -> TestResult {
    let dir = tempdir()?;
    let mut fmt = job("fmt", &["echo fmt-{python_version}"]);
    fmt.once = true;
    let cfg = config(dir.path(), &["3.9", "3.10", "3.11"], vec![fmt]);

    let result = run_orchestrator(
        cfg,
        FakeLocator::new(&["3.11.4", "3.10.2", "3.9.18"]),
        Arc::new(FakeProvisioner),
        &["fmt"],
        CancellationToken::new(),
    )
    .await?;

    assert!(result.success());
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].version.as_str(), "3.11.4");
    assert_eq!(
        result.results[0].steps[0].stdout.trim(),
        "fmt-3.11.4"
    );

    Ok(())
}

#[tokio::test]
async fn unresolved_specifier_skips_its_jobs_without_failing_the_run() -> TestResult {
    let dir = tempdir()?;
    let cfg = config(
        dir.path(),
        &["3.10", "3.12"],
        vec![job("lint", &["echo lint"])],
    );

    let result = run_orchestrator(
        cfg,
        FakeLocator::new(&["3.10.2"]),
        Arc::new(FakeProvisioner),
        &["lint"],
        CancellationToken::new(),
    )
    .await?;

    assert!(result.success());
    assert_eq!(result.unresolved, vec!["3.12".to_string()]);
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].version.as_str(), "3.10.2");

    Ok(())
}

#[tokio::test]
async fn provisioning_failure_is_scoped_to_its_version() -> TestResult {
    let dir = tempdir()?;
    let cfg = config(
        dir.path(),
        &["3.9", "3.10"],
        vec![job("lint", &["echo lint"])],
    );

    let result = run_orchestrator(
        cfg,
        FakeLocator::new(&["3.10.2", "3.9.18"]),
        Arc::new(FailingProvisioner {
            refuse: "3.9.18".to_string(),
        }),
        &["lint"],
        CancellationToken::new(),
    )
    .await?;

    assert!(!result.success());
    assert_eq!(find(&result, "lint", "3.9.18").status, JobStatus::Failed);
    assert_eq!(find(&result, "lint", "3.10.2").status, JobStatus::Passed);

    Ok(())
}

#[tokio::test]
async fn missing_template_value_aborts_before_any_execution() -> TestResult {
    let dir = tempdir()?;
    let cfg = config(dir.path(), &["3.10"], vec![job("lint", &["flake8 {module}"])]);

    let err = run_orchestrator(
        cfg,
        FakeLocator::new(&["3.10.2"]),
        Arc::new(FakeProvisioner),
        &["lint"],
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("module"));
    // Nothing was provisioned.
    assert!(!dir.path().join(".jobx").exists());

    Ok(())
}

#[tokio::test]
async fn cancellation_reports_cancelled_not_failed() -> TestResult {
    let dir = tempdir()?;
    let cfg = config(dir.path(), &["3.10"], vec![job("slow", &["sleep 30"])]);

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let result = run_orchestrator(
        cfg,
        FakeLocator::new(&["3.10.2"]),
        Arc::new(FakeProvisioner),
        &["slow"],
        cancel,
    )
    .await?;

    assert!(result.cancelled);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(result
        .results
        .iter()
        .all(|r| r.status != JobStatus::Failed));

    Ok(())
}

#[tokio::test]
async fn cancellation_during_provisioning_reports_cancelled_not_failed() -> TestResult {
    let dir = tempdir()?;
    let mut test = job("test", &["echo test"]);
    test.requires = vec!["build".to_string()];
    let cfg = config(
        dir.path(),
        &["3.11"],
        vec![job("build", &["echo build"]), test],
    );

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let result = run_orchestrator(
        cfg,
        FakeLocator::new(&["3.11.4"]),
        Arc::new(StallingProvisioner),
        &["test"],
        cancel,
    )
    .await?;

    assert!(result.cancelled);
    assert!(started.elapsed() < Duration::from_secs(10));
    // The interrupted version's pairs are cancelled, never failed or
    // blocked: no environment failed, the run was stopped.
    assert_eq!(find(&result, "build", "3.11.4").status, JobStatus::Cancelled);
    assert_eq!(find(&result, "test", "3.11.4").status, JobStatus::Cancelled);

    Ok(())
}

#[tokio::test]
async fn unknown_requested_job_executes_nothing() -> TestResult {
    let dir = tempdir()?;
    let cfg = config(dir.path(), &["3.10"], vec![job("lint", &["echo lint"])]);

    let err = run_orchestrator(
        cfg,
        FakeLocator::new(&["3.10.2"]),
        Arc::new(FakeProvisioner),
        &["ghost"],
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("ghost"));
    assert!(!dir.path().join(".jobx").exists());

    Ok(())
}
