// src/types.rs

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique, immutable identifier assigned to a task when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

impl TaskId {
    pub(crate) fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordering hint among otherwise-ready tasks. Higher runs first; equal
/// priorities keep submission order.
pub type Priority = i32;

/// Lifecycle state of a task.
///
/// Transitions only move forward: `Pending -> Ready -> Executing -> Finished`.
/// A task that is cancelled before it starts goes straight to `Finished`
/// with its cancellation flag set; there is no separate terminal
/// "cancelled" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskState {
    /// Waiting on at least one unfinished dependency.
    Pending,
    /// All dependencies finished; waiting for a concurrency slot.
    Ready,
    /// Work body has been started and has not yet signalled completion.
    Executing,
    /// Terminal.
    Finished,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Finished)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Ready => "ready",
            TaskState::Executing => "executing",
            TaskState::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Events published to a task's observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The task flipped to `Executing`; its work body is about to run.
    ExecutingStarted,
    /// Someone requested cancellation. The task may or may not have started.
    CancelRequested,
    /// The task reached `Finished` (success, error or cancellation).
    Finished,
}
