// src/lib.rs

//! A bounded-concurrency task queue with explicit completion signalling.
//!
//! Tasks are submitted to a [`TaskQueue`] with optional dependencies and a
//! priority. At most `concurrency_limit` of them execute at once. A task
//! holds its slot until its work body calls
//! [`TaskHandle::signal_finished`], which may happen long after the body
//! returned and on another thread. The queue never infers completion from
//! control returning to it.
//!
//! ```no_run
//! use serialq::{TaskOptions, TaskQueue, ThreadWorkerPool};
//!
//! # fn main() -> serialq::errors::Result<()> {
//! let queue = TaskQueue::new(1)?;
//! let pool = ThreadWorkerPool::new();
//!
//! let fetch = queue.submit_async(&pool, TaskOptions::new().label("fetch"), |_task| {
//!     // slow IO on a worker thread
//!     Ok(())
//! })?;
//! queue.submit_sync(TaskOptions::new().after(&fetch), |_task| Ok(()))?;
//!
//! queue.wait_until_all_finished();
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
mod sync;
pub mod task;
pub mod types;

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::config::loader::load_and_validate;
use crate::exec::{CommandSpec, command_body};

pub use crate::engine::{TaskOptions, TaskQueue};
pub use crate::errors::{QueueError, TaskError};
pub use crate::exec::{ThreadWorkerPool, TokioWorkerPool, WorkerPool};
pub use crate::task::{CompletionGuard, TaskHandle, TaskObserver};
pub use crate::types::{LifecycleEvent, Priority, TaskId, TaskState};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - task file loading
/// - the queue, with every configured command submitted to it
/// - Ctrl-C handling (cancel everything not yet started)
/// - a final per-task report
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if let Some(limit) = args.concurrency {
        if limit == 0 {
            bail!("--concurrency must be >= 1");
        }
        cfg.queue.concurrency_limit = limit;
    }

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let queue = TaskQueue::from_config(&cfg.queue)?;
    let handles = submit_all(&queue, &cfg, Handle::current())?;

    // Ctrl-C -> cancel whatever has not started; running commands finish.
    {
        let queue = queue.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("interrupt received; cancelling tasks that have not started");
            queue.cancel_all();
        });
    }

    let waiter = queue.clone();
    tokio::task::spawn_blocking(move || waiter.wait_until_all_finished())
        .await
        .context("waiting for queue to drain")?;

    report(&cfg, &handles)
}

/// Submit every configured task, dependencies first.
///
/// The queue is suspended while submitting so that priorities apply across
/// the whole initial set rather than to whichever task arrived first.
fn submit_all(
    queue: &TaskQueue,
    cfg: &ConfigFile,
    runtime: Handle,
) -> Result<HashMap<String, TaskHandle>> {
    let mut handles: HashMap<String, TaskHandle> = HashMap::new();

    queue.suspend();
    for name in cfg.submission_order() {
        let Some(tc) = cfg.task.get(name) else {
            continue;
        };

        let mut options = TaskOptions::new().label(name.clone()).priority(tc.priority);
        for dep in &tc.after {
            let dep_handle = handles
                .get(dep)
                .with_context(|| format!("dependency '{dep}' of '{name}' not submitted yet"))?;
            options = options.after(dep_handle);
        }

        let spec = CommandSpec {
            name: name.clone(),
            cmd: tc.cmd.clone(),
            skip_on_failed_dependency: cfg.queue.skip_dependents_on_failure,
        };
        let handle = queue.submit_with(options, command_body(spec, runtime.clone()))?;
        handles.insert(name.clone(), handle);
    }
    info!(tasks = handles.len(), limit = queue.concurrency_limit(), "all tasks submitted");
    queue.resume();

    Ok(handles)
}

fn report(cfg: &ConfigFile, handles: &HashMap<String, TaskHandle>) -> Result<()> {
    let mut failed = 0usize;

    println!();
    println!("serialq summary:");
    for name in cfg.submission_order() {
        let Some(task) = handles.get(name) else {
            continue;
        };

        if let Some(err) = task.error() {
            failed += 1;
            println!("  {name}: FAILED ({err})");
        } else if task.was_skipped() || task.is_cancelled() {
            println!("  {name}: cancelled");
        } else {
            println!("  {name}: ok");
        }
    }

    if failed > 0 {
        bail!("{failed} task(s) failed");
    }
    Ok(())
}

/// Dry-run output: queue settings, then tasks in submission order.
fn print_dry_run(cfg: &ConfigFile) {
    println!("serialq dry-run");
    println!("  queue.concurrency_limit = {}", cfg.queue.concurrency_limit);
    println!(
        "  queue.skip_dependents_on_failure = {}",
        cfg.queue.skip_dependents_on_failure
    );
    println!();

    println!("tasks ({}), in submission order:", cfg.task.len());
    for name in cfg.submission_order() {
        let Some(task) = cfg.task.get(name) else {
            continue;
        };
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if task.priority != 0 {
            println!("      priority: {}", task.priority);
        }
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
    }
}
