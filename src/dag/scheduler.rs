// src/dag/scheduler.rs

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::{debug, error, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::errors::{QueueError, Result};
use crate::task::TaskHandle;
use crate::task::state::Begin;
use crate::types::{Priority, TaskId, TaskState};

/// Bookkeeping for one unfinished task.
#[derive(Debug)]
struct Entry {
    task: TaskHandle,
    /// Submission sequence number; FIFO tie-break among equal priorities.
    seq: u64,
    /// Number of direct dependencies that have not finished yet.
    waiting_on: usize,
    /// Holds a concurrency slot.
    executing: bool,
}

/// Key in the ready heap: highest priority first, then lowest `seq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadyKey {
    priority: Priority,
    seq: u64,
    id: TaskId,
}

impl Ord for ReadyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ReadyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Admission control over a fixed number of concurrency slots.
///
/// The scheduler is a plain, single-threaded state machine. The queue wraps
/// it in a mutex; every method here runs inside that critical section, and
/// none of them invoke work bodies or observers. Those are returned in a
/// [`SchedulerStep`] for the queue to carry out after unlocking.
///
/// Only unfinished tasks are tracked. A task is dropped from the tables the
/// moment its `Finished` event has been accounted for.
#[derive(Debug)]
pub(crate) struct Scheduler {
    graph: DependencyGraph,
    entries: HashMap<TaskId, Entry>,
    ready: BinaryHeap<ReadyKey>,
    limit: usize,
    active: usize,
    next_seq: u64,
    suspended: bool,
}

impl Scheduler {
    pub(crate) fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(QueueError::InvalidConcurrencyLimit(limit));
        }

        Ok(Self {
            graph: DependencyGraph::new(),
            entries: HashMap::new(),
            ready: BinaryHeap::new(),
            limit,
            active: 0,
            next_seq: 0,
            suspended: false,
        })
    }

    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active
    }

    pub(crate) fn unfinished_count(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Handles of every task that has not finished yet, in submission order.
    pub(crate) fn unfinished_tasks(&self) -> Vec<TaskHandle> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.task.clone()).collect()
    }

    /// Admit a freshly created (`Pending`) task.
    ///
    /// Its dependencies must either be unfinished tasks of this scheduler or
    /// tasks that have already finished (those count as satisfied).
    pub(crate) fn insert(&mut self, task: TaskHandle) -> Result<SchedulerStep> {
        let id = task.id();

        let mut unfinished: HashSet<TaskId> = HashSet::new();
        for dep in task.dependencies() {
            let dep_id = dep.id();
            if dep_id == id {
                return Err(QueueError::DependencyCycle {
                    task: id,
                    dependency: dep_id,
                });
            }
            if self.entries.contains_key(&dep_id) {
                unfinished.insert(dep_id);
            } else if !dep.is_finished() {
                return Err(QueueError::UnknownTask(dep_id));
            }
        }

        self.graph.add_task(id);
        for dep_id in &unfinished {
            if let Err(err) = self.graph.add_dependency(id, *dep_id) {
                self.graph.remove_task(id);
                return Err(err);
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        debug!(
            task = %id,
            priority = task.priority(),
            waiting_on = unfinished.len(),
            "task submitted"
        );

        self.entries.insert(
            id,
            Entry {
                task,
                seq,
                waiting_on: unfinished.len(),
                executing: false,
            },
        );

        let mut step = SchedulerStep::default();
        if unfinished.is_empty() {
            self.make_ready(id, &mut step);
        }
        step.merge(self.dispatch());
        Ok(step)
    }

    /// Make `task` additionally wait on `on`. Only legal while `task` is
    /// still `Pending`.
    pub(crate) fn add_dependency(&mut self, task: &TaskHandle, on: &TaskHandle) -> Result<()> {
        let (id, on_id) = (task.id(), on.id());

        if !self.entries.contains_key(&id) {
            return match task.state() {
                TaskState::Finished => Err(QueueError::DependenciesFrozen {
                    task: id,
                    state: TaskState::Finished,
                }),
                _ => Err(QueueError::UnknownTask(id)),
            };
        }

        let state = task.state();
        if state != TaskState::Pending {
            return Err(QueueError::DependenciesFrozen { task: id, state });
        }

        if id == on_id {
            return Err(QueueError::DependencyCycle {
                task: id,
                dependency: on_id,
            });
        }

        if !self.entries.contains_key(&on_id) {
            if on.is_finished() {
                // Already satisfied; keep it visible for error inspection.
                return task.push_dependency(on.clone());
            }
            return Err(QueueError::UnknownTask(on_id));
        }

        if self.graph.has_dependency(id, on_id) {
            return Ok(());
        }

        self.graph.add_dependency(id, on_id)?;
        task.push_dependency(on.clone())?;

        if let Some(entry) = self.entries.get_mut(&id) {
            entry.waiting_on += 1;
            debug!(task = %id, dependency = %on_id, waiting_on = entry.waiting_on, "dependency added");
        }
        Ok(())
    }

    /// React to a task's `Finished` event: free its slot, propagate
    /// readiness to its dependents and start whatever now fits.
    pub(crate) fn complete(&mut self, task: &TaskHandle) -> SchedulerStep {
        let id = task.id();
        let Some(entry) = self.entries.get(&id) else {
            // Already accounted for (skipped tasks publish after retiring).
            return SchedulerStep::default();
        };

        if entry.executing {
            self.active -= 1;
        } else {
            warn!(task = %id, "finished event for a task that never held a slot");
        }

        debug!(task = %id, active = self.active, limit = self.limit, "slot released");

        let mut step = SchedulerStep::default();
        self.retire(id, &mut step);
        step.merge(self.dispatch());
        step.became_idle = self.is_idle();
        step
    }

    /// React to a cancellation request. Tasks that have not started are
    /// finished on the spot; executing tasks are left alone.
    pub(crate) fn cancel(&mut self, task: &TaskHandle) -> SchedulerStep {
        let id = task.id();
        let mut step = SchedulerStep::default();

        let Some(entry) = self.entries.get(&id) else {
            return step;
        };
        if entry.executing {
            return step;
        }

        if let Err(err) = task.finish_unstarted() {
            error!(task = %id, error = %err, "could not finish cancelled task");
            return step;
        }

        info!(task = %id, "task cancelled before start");
        self.retire(id, &mut step);
        step.skipped.push(task.clone());
        step.merge(self.dispatch());
        step.became_idle = self.is_idle();
        step
    }

    pub(crate) fn set_suspended(&mut self, suspended: bool) -> SchedulerStep {
        if self.suspended == suspended {
            return SchedulerStep::default();
        }

        self.suspended = suspended;
        info!(suspended, "queue suspension changed");
        if suspended {
            SchedulerStep::default()
        } else {
            self.dispatch()
        }
    }

    /// The dispatch loop: while a slot is free, start the best ready task.
    fn dispatch(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if self.suspended {
            return step;
        }

        while self.active < self.limit {
            let Some(key) = self.ready.pop() else {
                break;
            };

            // Stale heap entry: the task was cancelled while Ready.
            let Some(entry) = self.entries.get_mut(&key.id) else {
                continue;
            };

            match entry.task.begin() {
                Ok(Begin::Run) => {
                    entry.executing = true;
                    self.active += 1;
                    debug!(
                        task = %key.id,
                        priority = key.priority,
                        active = self.active,
                        limit = self.limit,
                        "starting task"
                    );
                    step.started.push(entry.task.clone());
                }
                Ok(Begin::Skipped) => {
                    let task = entry.task.clone();
                    info!(task = %key.id, "task cancelled before start; skipping work body");
                    self.retire(key.id, &mut step);
                    step.skipped.push(task);
                }
                Err(err) => {
                    error!(task = %key.id, error = %err, "ready task could not be started");
                }
            }
        }

        debug_assert!(self.active <= self.limit);
        step.became_idle = self.is_idle();
        step
    }

    fn make_ready(&mut self, id: TaskId, step: &mut SchedulerStep) {
        let Some(entry) = self.entries.get(&id) else {
            return;
        };

        if let Err(err) = entry.task.mark_ready() {
            // Cancelled-and-finished tasks are retired before this point, so
            // anything else is a bookkeeping bug.
            error!(task = %id, error = %err, "could not mark task ready");
            return;
        }

        debug!(task = %id, "dependencies satisfied; task ready");
        self.ready.push(ReadyKey {
            priority: entry.task.priority(),
            seq: entry.seq,
            id,
        });
        step.newly_ready.push(id);
    }

    /// Remove a finished task and push readiness to its direct dependents.
    fn retire(&mut self, id: TaskId, step: &mut SchedulerStep) {
        let dependents = self.graph.dependents_of(id);
        self.graph.remove_task(id);
        self.entries.remove(&id);

        for dependent in dependents {
            let now_ready = match self.entries.get_mut(&dependent) {
                Some(entry) => {
                    entry.waiting_on = entry.waiting_on.saturating_sub(1);
                    entry.waiting_on == 0 && entry.task.state() == TaskState::Pending
                }
                None => false,
            };
            if now_ready {
                self.make_ready(dependent, step);
            }
        }

        if self.entries.is_empty() {
            info!("all submitted tasks finished; queue idle");
        }
    }
}
