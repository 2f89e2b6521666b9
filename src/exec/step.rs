// src/exec/step.rs

//! Execution of a single rendered command inside an environment.

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::SpawnError;
use crate::types::{StepResult, StepStatus};
use crate::venv::Environment;

/// Run one rendered command to completion inside `env`.
///
/// The command goes through the platform shell with the environment's binary
/// directory prepended to `PATH` and `VIRTUAL_ENV` set, so bare tool names
/// resolve to whatever is installed in the virtualenv. A nonzero exit is
/// recorded in the result, never returned as an error; only a failure to
/// spawn the shell itself surfaces as [`SpawnError`].
///
/// With `capture` set, stdout and stderr are piped and collected into the
/// result. Without it the child inherits the parent's stdio and the captured
/// fields stay empty.
///
/// When `cancel` fires before the child exits, the child is killed and the
/// step is reported as [`StepStatus::Cancelled`].
pub async fn run_command(
    command: &str,
    env: &Environment,
    capture: bool,
    cancel: &CancellationToken,
) -> Result<StepResult, SpawnError> {
    let started = Instant::now();

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    cmd.env("PATH", prefixed_path(env))
        .env("VIRTUAL_ENV", &env.venv)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    if capture {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }

    debug!(version = %env.version, cmd = %command, "starting step process");

    let mut child = cmd.spawn().map_err(|source| SpawnError {
        command: command.to_string(),
        source,
    })?;

    // Drain both pipes concurrently so neither can fill and stall the child.
    let stdout_task = collect(child.stdout.take());
    let stderr_task = collect(child.stderr.take());

    tokio::select! {
        status = child.wait() => {
            let duration = started.elapsed();
            let stdout = finish(stdout_task).await;
            let stderr = finish(stderr_task).await;
            let code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(_) => -1,
            };
            info!(
                version = %env.version,
                cmd = %command,
                exit_code = code,
                "step process exited"
            );
            Ok(StepResult {
                cmd: command.to_string(),
                status: StepStatus::Exited(code),
                stdout,
                stderr,
                duration,
            })
        }
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            let _ = child.wait().await;
            if let Some(task) = &stdout_task {
                task.abort();
            }
            if let Some(task) = &stderr_task {
                task.abort();
            }
            info!(version = %env.version, cmd = %command, "step cancelled");
            Ok(StepResult::cancelled(command, started.elapsed()))
        }
    }
}

/// Read one of the child's pipes to the end in a background task.
fn collect<R>(pipe: Option<R>) -> Option<JoinHandle<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pipe.map(|mut reader| {
        tokio::spawn(async move {
            let mut buf = String::new();
            let _ = reader.read_to_string(&mut buf).await;
            buf
        })
    })
}

async fn finish(task: Option<JoinHandle<String>>) -> String {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

/// `PATH` with the environment's binary directory in front.
fn prefixed_path(env: &Environment) -> std::ffi::OsString {
    let bin = env.bin_dir();
    let current = std::env::var_os("PATH").unwrap_or_default();
    let mut paths = vec![bin];
    paths.extend(std::env::split_paths(&current));
    std::env::join_paths(paths).unwrap_or(current)
}
