use std::error::Error;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use tokio::sync::mpsc;

use jobx::config::Config;
use jobx::errors::ProvisionError;
use jobx::runtime::Interpreter;
use jobx::venv::{EnvManager, EnvUpdate, Environment, Provisioner};

type TestResult = Result<(), Box<dyn Error>>;

/// Provisioner that creates just enough on-disk structure for the cache
/// checks, counting how many times it ran.
struct FakeProvisioner {
    provisions: AtomicUsize,
    /// Lets tests force overlap between concurrent acquires.
    delay: Duration,
}

impl FakeProvisioner {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            provisions: AtomicUsize::new(0),
            delay,
        })
    }

    fn count(&self) -> usize {
        self.provisions.load(Ordering::SeqCst)
    }
}

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
            self.provisions.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;

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

fn interpreter(version: &str) -> Interpreter {
    Interpreter {
        version: version.parse().expect("valid version"),
        path: PathBuf::from("/usr/bin/true"),
    }
}

fn config(root: &Path) -> Config {
    Config {
        root: root.to_path_buf(),
        requirements: Some(vec![PathBuf::from("requirements.txt")]),
        ..Default::default()
    }
}

fn updates() -> (mpsc::Sender<EnvUpdate>, mpsc::Receiver<EnvUpdate>) {
    mpsc::channel(64)
}

#[tokio::test]
async fn concurrent_same_key_acquires_provision_once() -> TestResult {
    let dir = tempdir()?;
    fs::write(dir.path().join("requirements.txt"), "attrs\n")?;

    let provisioner = FakeProvisioner::new(Duration::from_millis(50));
    let manager = Arc::new(EnvManager::new(&config(dir.path()), provisioner.clone()));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let manager = Arc::clone(&manager);
        let interp = interpreter("3.11.4");
        handles.push(tokio::spawn(async move {
            let (tx, _rx) = updates();
            manager.acquire(&interp, &tx).await
        }));
    }

    let mut venvs = Vec::new();
    for handle in handles {
        let env = handle.await??;
        venvs.push(env.venv);
    }

    assert_eq!(provisioner.count(), 1);
    assert!(venvs.iter().all(|v| v == &venvs[0]));

    Ok(())
}

#[tokio::test]
async fn distinct_versions_provision_independently() -> TestResult {
    let dir = tempdir()?;
    fs::write(dir.path().join("requirements.txt"), "attrs\n")?;

    let provisioner = FakeProvisioner::new(Duration::from_millis(20));
    let manager = Arc::new(EnvManager::new(&config(dir.path()), provisioner.clone()));

    let (a, b) = tokio::join!(
        async {
            let (tx, _rx) = updates();
            manager.acquire(&interpreter("3.11.4"), &tx).await
        },
        async {
            let (tx, _rx) = updates();
            manager.acquire(&interpreter("3.10.9"), &tx).await
        },
    );

    let (a, b) = (a?, b?);
    assert_eq!(provisioner.count(), 2);
    assert_ne!(a.venv, b.venv);

    Ok(())
}

#[tokio::test]
async fn unchanged_requirements_reuse_the_environment_across_managers() -> TestResult {
    let dir = tempdir()?;
    fs::write(dir.path().join("requirements.txt"), "attrs\n")?;

    let provisioner = FakeProvisioner::new(Duration::ZERO);
    let (tx, _rx) = updates();

    let first = EnvManager::new(&config(dir.path()), provisioner.clone());
    first.acquire(&interpreter("3.11.4"), &tx).await?;
    assert_eq!(provisioner.count(), 1);

    // A fresh manager over the same root finds the cached venv on disk.
    let second = EnvManager::new(&config(dir.path()), provisioner.clone());
    second.acquire(&interpreter("3.11.4"), &tx).await?;
    assert_eq!(provisioner.count(), 1);

    Ok(())
}

#[tokio::test]
async fn changed_requirements_trigger_a_rebuild() -> TestResult {
    let dir = tempdir()?;
    fs::write(dir.path().join("requirements.txt"), "attrs\n")?;

    let provisioner = FakeProvisioner::new(Duration::ZERO);
    let (tx, _rx) = updates();

    let first = EnvManager::new(&config(dir.path()), provisioner.clone());
    first.acquire(&interpreter("3.11.4"), &tx).await?;
    assert_eq!(provisioner.count(), 1);

    fs::write(dir.path().join("requirements.txt"), "attrs\nclick\n")?;

    let second = EnvManager::new(&config(dir.path()), provisioner.clone());
    second.acquire(&interpreter("3.11.4"), &tx).await?;
    assert_eq!(provisioner.count(), 2);

    Ok(())
}

#[tokio::test]
async fn clean_removes_the_tree_and_is_idempotent() -> TestResult {
    let dir = tempdir()?;
    fs::write(dir.path().join("requirements.txt"), "attrs\n")?;

    let provisioner = FakeProvisioner::new(Duration::ZERO);
    let manager = EnvManager::new(&config(dir.path()), provisioner.clone());

    let (tx, _rx) = updates();
    let env = manager.acquire(&interpreter("3.11.4"), &tx).await?;
    assert!(env.python.is_file());

    manager.clean()?;
    assert!(!dir.path().join(".jobx").exists());

    // Nothing left to remove; still fine.
    manager.clean()?;

    Ok(())
}
