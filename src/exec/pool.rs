// src/exec/pool.rs

//! Worker-pool abstraction.
//!
//! The queue never owns threads. Asynchronous work bodies hand a job to a
//! [`WorkerPool`] and return; the job signals completion from whatever
//! thread the pool ran it on.
//!
//! - [`ThreadWorkerPool`] spawns one OS thread per job.
//! - [`TokioWorkerPool`] runs jobs on a Tokio runtime's blocking pool.
//!
//! Tests can provide their own pool that, for example, holds jobs until
//! told to release them.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Handle;
use tracing::{debug, error};

use crate::errors::{QueueError, Result, TaskError};
use crate::task::TaskHandle;
use crate::task::drain;

/// A unit of deferred work handed to a pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// "Execute this later, on some thread."
pub trait WorkerPool: Send + Sync {
    fn execute(&self, job: Job);
}

impl<P: WorkerPool + ?Sized> WorkerPool for Arc<P> {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }
}

/// Run `work` and turn its outcome into the task's completion signal.
///
/// A panic in `work` is reported as a task error, so every path through the
/// body ends in exactly one signal.
pub fn run_to_completion<F>(task: &TaskHandle, work: F)
where
    F: FnOnce(&TaskHandle) -> std::result::Result<(), TaskError>,
{
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| work(task))) {
        Ok(res) => res,
        Err(_) => Err(TaskError::new("work body panicked")),
    };

    if task.is_finished() {
        debug!(task = %task.id(), "work body signalled on its own; not signalling again");
        return;
    }

    // Nothing runs after this signal, so follow-up starts may wait for the
    // body to unwind.
    if let Err(err) = drain::tail(task.id(), || task.signal_finished(outcome.err())) {
        error!(task = %task.id(), error = %err, "could not signal completion");
    }
}

/// Spawns a dedicated OS thread for every job.
#[derive(Debug, Clone, Default)]
pub struct ThreadWorkerPool {
    name: Option<String>,
    counter: Arc<AtomicU64>,
}

impl ThreadWorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Threads will be named `<prefix>-<n>`.
    pub fn named(prefix: impl Into<String>) -> Self {
        Self {
            name: Some(prefix.into()),
            ..Self::default()
        }
    }
}

impl WorkerPool for ThreadWorkerPool {
    fn execute(&self, job: Job) {
        let mut builder = std::thread::Builder::new();
        if let Some(prefix) = &self.name {
            let n = self.counter.fetch_add(1, Ordering::Relaxed);
            builder = builder.name(format!("{prefix}-{n}"));
        }

        // `spawn` drops the closure on failure; keep the job reachable so it
        // can still run inline.
        let slot = Arc::new(std::sync::Mutex::new(Some(job)));
        let thread_slot = Arc::clone(&slot);
        let spawned = builder.spawn(move || {
            let job = crate::sync::lock(&thread_slot).take();
            if let Some(job) = job {
                job();
            }
        });

        if let Err(err) = spawned {
            // Running inline is the only way left to reach the job's
            // completion signal.
            error!(error = %err, "failed to spawn worker thread; running job inline");
            let job = crate::sync::lock(&slot).take();
            if let Some(job) = job {
                job();
            }
        }
    }
}

/// Runs jobs on a Tokio runtime's blocking thread pool.
#[derive(Debug, Clone)]
pub struct TokioWorkerPool {
    handle: Handle,
}

impl TokioWorkerPool {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Pool bound to the runtime the caller is currently inside.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| QueueError::Other(anyhow::anyhow!("no Tokio runtime: {e}")))?;
        Ok(Self { handle })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl WorkerPool for TokioWorkerPool {
    fn execute(&self, job: Job) {
        drop(self.handle.spawn_blocking(job));
    }
}
