// src/exec/command.rs

//! Shell commands as asynchronous work bodies.
//!
//! Starting a command task only spawns the process on the Tokio runtime;
//! the task keeps its slot until the process exits and the spawned future
//! signals completion.

use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::errors::TaskError;
use crate::task::TaskHandle;

/// Everything needed to run one configured command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: String,
    pub cmd: String,
    /// Self-cancel instead of running if any dependency finished with an
    /// error.
    pub skip_on_failed_dependency: bool,
}

/// Build the work body for `spec`. The process runs on `runtime`.
pub fn command_body(spec: CommandSpec, runtime: Handle) -> impl FnOnce(TaskHandle) + Send + 'static {
    move |task: TaskHandle| {
        if spec.skip_on_failed_dependency {
            let failed: Vec<String> = task
                .failed_dependencies()
                .iter()
                .map(|dep| dep.label().unwrap_or("?").to_string())
                .collect();

            if !failed.is_empty() {
                warn!(task = %spec.name, ?failed, "dependency failed; skipping command");
                task.cancel();
                if let Err(err) = task.succeed() {
                    error!(task = %spec.name, error = %err, "could not signal completion");
                }
                return;
            }
        }

        runtime.spawn(async move {
            let error = match run_command(&spec).await {
                Ok(status) if status.success() => None,
                Ok(status) => Some(TaskError::new(match status.code() {
                    Some(code) => format!("command exited with code {code}"),
                    None => "command terminated by signal".to_string(),
                })),
                Err(err) => Some(TaskError::from(err)),
            };

            if let Err(err) = task.signal_finished(error) {
                error!(task = %spec.name, error = %err, "could not signal completion");
            }
        });
    }
}

async fn run_command(spec: &CommandSpec) -> Result<ExitStatus> {
    info!(task = %spec.name, cmd = %spec.cmd, "starting command");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&spec.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&spec.cmd);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", spec.name))?;

    let stdout = child.stdout.take().map(|s| relay_lines(spec.name.clone(), s, false));
    let stderr = child.stderr.take().map(|s| relay_lines(spec.name.clone(), s, true));

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of task '{}'", spec.name))?;

    // Let the relays flush whatever the process wrote before exiting.
    for relay in [stdout, stderr].into_iter().flatten() {
        if let Err(err) = relay.await {
            debug!(task = %spec.name, error = %err, "output relay ended abnormally");
        }
    }

    info!(
        task = %spec.name,
        exit_code = status.code().unwrap_or(-1),
        success = status.success(),
        "command exited"
    );

    Ok(status)
}

/// Copy a child stream line by line to our own stdout/stderr, prefixed with
/// the task name.
fn relay_lines<R>(name: String, stream: R, is_stderr: bool) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_stderr {
                eprintln!("[{name}] {line}");
            } else {
                println!("[{name}] {line}");
            }
        }
    })
}
