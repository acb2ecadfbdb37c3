// src/engine/queue.rs

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace};

use crate::config::QueueConfig;
use crate::dag::scheduler::Scheduler;
use crate::dag::scheduler_step::SchedulerStep;
use crate::errors::{Result, TaskError};
use crate::exec::pool::{WorkerPool, run_to_completion};
use crate::sync::{lock, wait, wait_timeout};
use crate::task::drain::{self, Deferred};
use crate::task::{TaskHandle, TaskObserver};
use crate::types::{LifecycleEvent, Priority};

/// Per-task submission options.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    pub dependencies: Vec<TaskHandle>,
    pub priority: Priority,
    pub label: Option<String>,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn after(mut self, dependency: &TaskHandle) -> Self {
        self.dependencies.push(dependency.clone());
        self
    }

    pub fn after_all<'a>(mut self, dependencies: impl IntoIterator<Item = &'a TaskHandle>) -> Self {
        self.dependencies.extend(dependencies.into_iter().cloned());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

struct Shared {
    name: Option<String>,
    scheduler: Mutex<Scheduler>,
    idle: Condvar,
    observer: Arc<dyn TaskObserver>,
}

impl Shared {
    /// Run `f` inside the critical section, then carry out the resulting
    /// step outside it.
    fn apply<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Scheduler) -> Result<SchedulerStep>,
    {
        let step = {
            let mut scheduler = lock(&self.scheduler);
            let step = f(&mut scheduler)?;
            if scheduler.is_idle() {
                self.idle.notify_all();
            }
            step
        };

        if step.is_empty() {
            return Ok(());
        }
        if !step.newly_ready.is_empty() {
            trace!(queue = ?self.name, ready = ?step.newly_ready, "tasks became ready");
        }
        if step.became_idle {
            debug!(queue = ?self.name, "queue drained");
        }

        let actions = step
            .skipped
            .into_iter()
            .map(Deferred::PublishFinished)
            .chain(step.started.into_iter().map(Deferred::Start))
            .collect();
        drain::defer(actions);
        Ok(())
    }
}

/// The queue's own observer. Holds a weak reference so tasks that outlive
/// their queue do not keep it alive.
struct QueueObserver {
    shared: Weak<Shared>,
}

impl TaskObserver for QueueObserver {
    fn on_event(&self, task: &TaskHandle, event: LifecycleEvent) {
        let Some(shared) = self.shared.upgrade() else {
            trace!(task = %task.id(), ?event, "event for task of dropped queue");
            return;
        };

        let res = match event {
            LifecycleEvent::ExecutingStarted => {
                trace!(task = %task.id(), "work body starting");
                Ok(())
            }
            LifecycleEvent::Finished => shared.apply(|s| Ok(s.complete(task))),
            LifecycleEvent::CancelRequested => shared.apply(|s| Ok(s.cancel(task))),
        };

        if let Err(err) = res {
            error!(task = %task.id(), ?event, error = %err, "queue failed to process task event");
        }
    }
}

/// A bounded-concurrency task queue.
///
/// At most `concurrency_limit` tasks are `Executing` at any time. A task
/// keeps its slot until it explicitly signals completion, which may happen
/// long after its work body returned and on a different thread. With a
/// limit of 1 this gives strict serialization, even for asynchronous work.
///
/// Cloning is cheap; clones share the same queue.
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<Shared>,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheduler = lock(&self.shared.scheduler);
        f.debug_struct("TaskQueue")
            .field("name", &self.shared.name)
            .field("limit", &scheduler.limit())
            .field("active", &scheduler.active_count())
            .field("unfinished", &scheduler.unfinished_count())
            .field("suspended", &scheduler.is_suspended())
            .finish()
    }
}

impl TaskQueue {
    /// Create a queue with the given concurrency limit (must be >= 1).
    pub fn new(concurrency_limit: usize) -> Result<Self> {
        Self::build(concurrency_limit, None)
    }

    pub fn from_config(config: &QueueConfig) -> Result<Self> {
        Self::build(config.concurrency_limit, config.name.clone())
    }

    fn build(concurrency_limit: usize, name: Option<String>) -> Result<Self> {
        let scheduler = Scheduler::new(concurrency_limit)?;
        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| Shared {
            name,
            scheduler: Mutex::new(scheduler),
            idle: Condvar::new(),
            observer: Arc::new(QueueObserver {
                shared: weak.clone(),
            }),
        });

        info!(queue = ?shared.name, concurrency_limit, "task queue created");
        Ok(Self { shared })
    }

    pub fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }

    /// Submit a work body with the given dependencies and priority.
    ///
    /// The body receives its own [`TaskHandle`] and must eventually call
    /// [`TaskHandle::signal_finished`] exactly once; until it does, the task
    /// holds a concurrency slot.
    pub fn submit<F>(
        &self,
        work: F,
        dependencies: &[TaskHandle],
        priority: Priority,
    ) -> Result<TaskHandle>
    where
        F: FnOnce(TaskHandle) + Send + 'static,
    {
        let options = TaskOptions {
            dependencies: dependencies.to_vec(),
            priority,
            label: None,
        };
        self.submit_with(options, work)
    }

    pub fn submit_with<F>(&self, options: TaskOptions, work: F) -> Result<TaskHandle>
    where
        F: FnOnce(TaskHandle) + Send + 'static,
    {
        let task = TaskHandle::new(
            Box::new(work),
            options.priority,
            options.label,
            options.dependencies,
        );
        task.subscribe(Arc::clone(&self.shared.observer));

        let admitted = task.clone();
        if let Err(err) = self.shared.apply(move |s| s.insert(admitted)) {
            error!(task = %task.id(), error = %err, "rejected task submission");
            return Err(err);
        }
        Ok(task)
    }

    /// Submit a synchronous body. It runs inline when the task starts and
    /// its result becomes the completion signal.
    pub fn submit_sync<F>(&self, options: TaskOptions, work: F) -> Result<TaskHandle>
    where
        F: FnOnce(&TaskHandle) -> std::result::Result<(), TaskError> + Send + 'static,
    {
        self.submit_with(options, move |task| run_to_completion(&task, work))
    }

    /// Submit a body that runs on `pool`. Starting the task only hands the
    /// job over; the slot is released when the job finishes on whatever
    /// thread the pool used.
    pub fn submit_async<P, F>(&self, pool: &P, options: TaskOptions, work: F) -> Result<TaskHandle>
    where
        P: WorkerPool + Clone + 'static,
        F: FnOnce(&TaskHandle) -> std::result::Result<(), TaskError> + Send + 'static,
    {
        let pool = pool.clone();
        self.submit_with(options, move |task| {
            pool.execute(Box::new(move || run_to_completion(&task, work)));
        })
    }

    /// Make a still-`Pending` task also wait on `dependency`.
    ///
    /// Fails with [`QueueError::DependencyCycle`](crate::errors::QueueError)
    /// if this would make `task` its own transitive dependency.
    pub fn add_dependency(&self, task: &TaskHandle, dependency: &TaskHandle) -> Result<()> {
        let mut scheduler = lock(&self.shared.scheduler);
        let res = scheduler.add_dependency(task, dependency);
        if let Err(ref err) = res {
            error!(task = %task.id(), dependency = %dependency.id(), error = %err, "rejected dependency");
        }
        res
    }

    /// Request cancellation of `task`. Equivalent to [`TaskHandle::cancel`].
    pub fn cancel(&self, task: &TaskHandle) {
        task.cancel();
    }

    /// Request cancellation of every unfinished task.
    pub fn cancel_all(&self) {
        let tasks = lock(&self.shared.scheduler).unfinished_tasks();
        info!(count = tasks.len(), "cancelling all unfinished tasks");
        for task in tasks {
            task.cancel();
        }
    }

    /// Stop starting new tasks. Executing tasks are unaffected.
    pub fn suspend(&self) {
        let _ = self.shared.apply(|s| Ok(s.set_suspended(true)));
    }

    pub fn resume(&self) {
        let _ = self.shared.apply(|s| Ok(s.set_suspended(false)));
    }

    pub fn is_suspended(&self) -> bool {
        lock(&self.shared.scheduler).is_suspended()
    }

    pub fn concurrency_limit(&self) -> usize {
        lock(&self.shared.scheduler).limit()
    }

    /// Number of tasks currently holding a slot.
    pub fn active_count(&self) -> usize {
        lock(&self.shared.scheduler).active_count()
    }

    /// Number of submitted tasks that have not finished.
    pub fn unfinished_count(&self) -> usize {
        lock(&self.shared.scheduler).unfinished_count()
    }

    pub fn is_idle(&self) -> bool {
        lock(&self.shared.scheduler).is_idle()
    }

    /// Block until every submitted task has finished.
    ///
    /// Must not be called from inside a work body of this queue: that task
    /// cannot finish while its body is blocked here.
    pub fn wait_until_all_finished(&self) {
        let mut scheduler = lock(&self.shared.scheduler);
        while !scheduler.is_idle() {
            scheduler = wait(&self.shared.idle, scheduler);
        }
    }

    /// Like [`wait_until_all_finished`](Self::wait_until_all_finished) with
    /// an upper bound. Returns `true` if the queue went idle in time.
    pub fn wait_until_all_finished_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut scheduler = lock(&self.shared.scheduler);
        while !scheduler.is_idle() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = wait_timeout(&self.shared.idle, scheduler, deadline - now);
            scheduler = guard;
        }
        true
    }
}
