// src/task/state.rs

//! Per-task lifecycle state machine.
//!
//! This is the pure part of a task: it knows which transitions are legal
//! and records the outcome, but does no locking and publishes nothing.
//! [`TaskHandle`](super::TaskHandle) wraps it in a mutex and fans the
//! resulting events out to observers.

use crate::errors::{QueueError, Result, TaskError};
use crate::types::{TaskId, TaskState};

/// What `begin` decided for a task that was picked by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Begin {
    /// Task is now `Executing`; its work body must be invoked.
    Run,
    /// Cancellation was requested before start; the task went straight to
    /// `Finished` and its work body must never run.
    Skipped,
}

#[derive(Debug)]
pub(crate) struct TaskStatus {
    pub(crate) state: TaskState,
    pub(crate) cancel_requested: bool,
    /// Finished without the work body ever running.
    pub(crate) skipped: bool,
    pub(crate) error: Option<TaskError>,
}

impl TaskStatus {
    pub(crate) fn new() -> Self {
        Self {
            state: TaskState::Pending,
            cancel_requested: false,
            skipped: false,
            error: None,
        }
    }

    /// `Pending -> Ready`, once every dependency has finished.
    pub(crate) fn mark_ready(&mut self, id: TaskId) -> Result<()> {
        self.transition(id, TaskState::Pending, TaskState::Ready)
    }

    /// Called by the scheduler exactly once, with a slot reserved.
    pub(crate) fn begin(&mut self, id: TaskId) -> Result<Begin> {
        if self.state != TaskState::Ready {
            return Err(QueueError::InvalidTransition {
                task: id,
                from: self.state,
                to: TaskState::Executing,
            });
        }

        if self.cancel_requested {
            self.state = TaskState::Finished;
            self.skipped = true;
            return Ok(Begin::Skipped);
        }

        self.state = TaskState::Executing;
        Ok(Begin::Run)
    }

    /// `Executing -> Finished`. At most once.
    pub(crate) fn finish(&mut self, id: TaskId, error: Option<TaskError>) -> Result<()> {
        match self.state {
            TaskState::Executing => {
                self.state = TaskState::Finished;
                self.error = error;
                Ok(())
            }
            TaskState::Finished => Err(QueueError::AlreadyFinished(id)),
            from => Err(QueueError::InvalidTransition {
                task: id,
                from,
                to: TaskState::Finished,
            }),
        }
    }

    /// Drive a task that never started straight to `Finished`.
    pub(crate) fn finish_unstarted(&mut self, id: TaskId) -> Result<()> {
        match self.state {
            TaskState::Pending | TaskState::Ready => {
                self.state = TaskState::Finished;
                self.skipped = true;
                Ok(())
            }
            TaskState::Finished => Err(QueueError::AlreadyFinished(id)),
            from => Err(QueueError::InvalidTransition {
                task: id,
                from,
                to: TaskState::Finished,
            }),
        }
    }

    /// Returns `true` if this call newly set the flag.
    pub(crate) fn request_cancel(&mut self) -> bool {
        if self.state.is_terminal() || self.cancel_requested {
            return false;
        }
        self.cancel_requested = true;
        true
    }

    fn transition(&mut self, id: TaskId, from: TaskState, to: TaskState) -> Result<()> {
        if self.state != from {
            return Err(QueueError::InvalidTransition {
                task: id,
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}
