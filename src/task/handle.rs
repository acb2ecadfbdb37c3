// src/task/handle.rs

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use crate::errors::{QueueError, Result, TaskError};
use crate::sync::{lock, wait, wait_timeout};
use crate::task::guard::CompletionGuard;
use crate::task::signal::{ObserverList, TaskObserver};
use crate::task::state::{Begin, TaskStatus};
use crate::types::{LifecycleEvent, Priority, TaskId, TaskState};

/// A unit of work. It receives a handle to its own task so it can signal
/// completion later, from any thread.
pub type WorkBody = Box<dyn FnOnce(TaskHandle) + Send + 'static>;

struct TaskCore {
    id: TaskId,
    priority: Priority,
    label: Option<String>,
    status: Mutex<TaskStatus>,
    finished: Condvar,
    body: Mutex<Option<WorkBody>>,
    dependencies: Mutex<Vec<TaskHandle>>,
    observers: ObserverList,
}

impl Drop for TaskCore {
    fn drop(&mut self) {
        trace!(task = %self.id, label = ?self.label, "task released");
    }
}

/// Shared, cloneable reference to a submitted task.
///
/// This is what the queue hands back from `submit`, and what a work body
/// receives. All methods are safe to call from any thread.
#[derive(Clone)]
pub struct TaskHandle {
    core: Arc<TaskCore>,
}

impl TaskHandle {
    pub(crate) fn new(
        body: WorkBody,
        priority: Priority,
        label: Option<String>,
        dependencies: Vec<TaskHandle>,
    ) -> Self {
        Self {
            core: Arc::new(TaskCore {
                id: TaskId::next(),
                priority,
                label,
                status: Mutex::new(TaskStatus::new()),
                finished: Condvar::new(),
                body: Mutex::new(Some(body)),
                dependencies: Mutex::new(dependencies),
                observers: ObserverList::default(),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.core.id
    }

    pub fn priority(&self) -> Priority {
        self.core.priority
    }

    pub fn label(&self) -> Option<&str> {
        self.core.label.as_deref()
    }

    pub fn state(&self) -> TaskState {
        lock(&self.core.status).state
    }

    pub fn is_pending(&self) -> bool {
        self.state() == TaskState::Pending
    }

    pub fn is_ready(&self) -> bool {
        self.state() == TaskState::Ready
    }

    pub fn is_executing(&self) -> bool {
        self.state() == TaskState::Executing
    }

    pub fn is_finished(&self) -> bool {
        self.state() == TaskState::Finished
    }

    /// Whether cancellation has been requested. Stays `true` after the task
    /// finishes.
    pub fn is_cancelled(&self) -> bool {
        lock(&self.core.status).cancel_requested
    }

    /// `true` if the task finished without its work body ever running.
    pub fn was_skipped(&self) -> bool {
        lock(&self.core.status).skipped
    }

    /// Error reported through `signal_finished`, if any.
    pub fn error(&self) -> Option<TaskError> {
        lock(&self.core.status).error.clone()
    }

    pub fn dependencies(&self) -> Vec<TaskHandle> {
        lock(&self.core.dependencies).clone()
    }

    /// Dependencies that finished with an error.
    ///
    /// A failed dependency does not stop this task from running; a work body
    /// that wants to bail out checks this and cancels itself.
    pub fn failed_dependencies(&self) -> Vec<TaskHandle> {
        self.dependencies()
            .into_iter()
            .filter(|dep| dep.error().is_some())
            .collect()
    }

    /// Register an additional observer for this task's lifecycle events.
    pub fn subscribe(&self, observer: Arc<dyn TaskObserver>) {
        self.core.observers.subscribe(observer);
    }

    /// Request cancellation.
    ///
    /// Cooperative: a task that has not started will never run its work
    /// body and is driven to `Finished` by its queue. A task that is already
    /// executing only sees the flag; it still has to signal completion.
    pub fn cancel(&self) {
        let (newly, state) = {
            let mut status = lock(&self.core.status);
            (status.request_cancel(), status.state)
        };

        if !newly {
            return;
        }

        if state == TaskState::Executing {
            warn!(task = %self.id(), "cancel requested for executing task; body must finish on its own");
        } else {
            debug!(task = %self.id(), %state, "cancel requested");
        }

        self.core.observers.publish(self, LifecycleEvent::CancelRequested);
    }

    /// The Completion Signal: announce that this task's work is truly done.
    ///
    /// Must be called exactly once, after the task started. A second call
    /// returns [`QueueError::AlreadyFinished`]; calling it on a task that
    /// never started returns [`QueueError::InvalidTransition`].
    ///
    /// Tasks that become startable because of this signal are started
    /// before it returns, possibly running their bodies on this thread.
    pub fn signal_finished(&self, error: Option<TaskError>) -> Result<()> {
        let failure = error.as_ref().map(ToString::to_string);

        {
            let mut status = lock(&self.core.status);
            if let Err(err) = status.finish(self.id(), error) {
                error!(task = %self.id(), error = %err, "rejected completion signal");
                return Err(err);
            }
            self.core.finished.notify_all();
        }

        match failure {
            Some(msg) => warn!(task = %self.id(), error = %msg, "task finished with error"),
            None => debug!(task = %self.id(), "task finished"),
        }

        self.core.observers.publish(self, LifecycleEvent::Finished);
        Ok(())
    }

    /// Shorthand for `signal_finished(None)`.
    pub fn succeed(&self) -> Result<()> {
        self.signal_finished(None)
    }

    /// Shorthand for `signal_finished(Some(error))`.
    pub fn fail(&self, error: impl Into<TaskError>) -> Result<()> {
        self.signal_finished(Some(error.into()))
    }

    /// Scoped guard that signals completion when dropped, unless the work
    /// body already did so explicitly.
    pub fn completion_guard(&self) -> CompletionGuard {
        CompletionGuard::new(self.clone())
    }

    /// Block the calling thread until this task is `Finished`.
    pub fn wait(&self) {
        let mut status = lock(&self.core.status);
        while status.state != TaskState::Finished {
            status = wait(&self.core.finished, status);
        }
    }

    /// Like [`wait`](Self::wait) with an upper bound. Returns `true` if the
    /// task finished in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut status = lock(&self.core.status);
        while status.state != TaskState::Finished {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = wait_timeout(&self.core.finished, status, deadline - now);
            status = guard;
        }
        true
    }

    pub(crate) fn mark_ready(&self) -> Result<()> {
        lock(&self.core.status).mark_ready(self.id())
    }

    /// First half of starting a task, run inside the queue's critical
    /// section. Does not publish; see [`run_body`](Self::run_body).
    pub(crate) fn begin(&self) -> Result<Begin> {
        let decision = {
            let mut status = lock(&self.core.status);
            let decision = status.begin(self.id())?;
            if decision == Begin::Skipped {
                self.core.finished.notify_all();
            }
            decision
        };

        if decision == Begin::Skipped {
            drop(lock(&self.core.body).take());
        }
        Ok(decision)
    }

    /// Second half of starting a task: publish `ExecutingStarted` and invoke
    /// the work body on the calling thread.
    ///
    /// A panicking body is contained here. If it had not signalled yet, the
    /// task is finished with an error so its slot is not leaked.
    pub(crate) fn run_body(&self) {
        self.core.observers.publish(self, LifecycleEvent::ExecutingStarted);

        let Some(body) = lock(&self.core.body).take() else {
            error!(task = %self.id(), "work body missing at start; finishing with error");
            let _ = self.fail("work body missing");
            return;
        };

        let task = self.clone();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || body(task))) {
            let msg = panic_message(payload.as_ref());
            error!(task = %self.id(), panic = %msg, "work body panicked");
            if !self.is_finished() {
                let _ = self.fail(format!("work body panicked: {msg}"));
            }
        }
    }

    /// Drive a never-started task to `Finished`. Does not publish.
    pub(crate) fn finish_unstarted(&self) -> Result<()> {
        {
            let mut status = lock(&self.core.status);
            status.finish_unstarted(self.id())?;
            self.core.finished.notify_all();
        }
        drop(lock(&self.core.body).take());
        Ok(())
    }

    pub(crate) fn publish(&self, event: LifecycleEvent) {
        self.core.observers.publish(self, event);
    }

    /// Append a dependency. Only legal while the task is `Pending`; the
    /// caller holds the queue lock, which is what keeps this race-free
    /// against the readiness scan.
    pub(crate) fn push_dependency(&self, dependency: TaskHandle) -> Result<()> {
        let state = self.state();
        if state != TaskState::Pending {
            return Err(QueueError::DependenciesFrozen {
                task: self.id(),
                state,
            });
        }
        lock(&self.core.dependencies).push(dependency);
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for TaskHandle {}

impl Hash for TaskHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = lock(&self.core.status);
        f.debug_struct("TaskHandle")
            .field("id", &self.core.id)
            .field("label", &self.core.label)
            .field("priority", &self.core.priority)
            .field("state", &status.state)
            .field("cancel_requested", &status.cancel_requested)
            .finish_non_exhaustive()
    }
}
