// src/dag/scheduler_step.rs

//! Step-by-step result type for the scheduler.

use crate::task::TaskHandle;
use crate::types::TaskId;

/// Structured result of a single scheduler step.
///
/// The scheduler only mutates bookkeeping. Everything that runs user code
/// (work bodies, observers) is described here and carried out by the queue
/// after it has left its critical section.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that took a slot and are now `Executing`; their bodies must run.
    pub started: Vec<TaskHandle>,
    /// Tasks driven to `Finished` without running (cancelled before start);
    /// their `Finished` event still has to be published.
    pub skipped: Vec<TaskHandle>,
    /// Tasks that moved `Pending -> Ready` during this step.
    pub newly_ready: Vec<TaskId>,
    /// Whether this step left the scheduler with no unfinished tasks.
    pub became_idle: bool,
}

impl SchedulerStep {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
            && self.skipped.is_empty()
            && self.newly_ready.is_empty()
            && !self.became_idle
    }

    pub(crate) fn merge(&mut self, other: SchedulerStep) {
        self.started.extend(other.started);
        self.skipped.extend(other.skipped);
        self.newly_ready.extend(other.newly_ready);
        self.became_idle |= other.became_idle;
    }
}
