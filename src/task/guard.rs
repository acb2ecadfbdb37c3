// src/task/guard.rs

use tracing::{debug, warn};

use crate::errors::{QueueError, Result, TaskError};
use crate::task::TaskHandle;

/// Signals completion for a task when dropped.
///
/// Work bodies with several exit paths take one of these up front and
/// either finish it explicitly or let it drop. A drop without an explicit
/// finish records an error on the task, so early returns surface as
/// failures instead of a slot that is never freed.
#[must_use = "dropping the guard immediately finishes the task"]
#[derive(Debug)]
pub struct CompletionGuard {
    task: Option<TaskHandle>,
}

impl CompletionGuard {
    pub(crate) fn new(task: TaskHandle) -> Self {
        Self { task: Some(task) }
    }

    pub fn task(&self) -> Option<&TaskHandle> {
        self.task.as_ref()
    }

    pub fn finish(mut self, error: Option<TaskError>) -> Result<()> {
        match self.task.take() {
            Some(task) => task.signal_finished(error),
            None => Ok(()),
        }
    }

    pub fn succeed(self) -> Result<()> {
        self.finish(None)
    }

    pub fn fail(self, error: impl Into<TaskError>) -> Result<()> {
        self.finish(Some(error.into()))
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        if task.is_finished() {
            return;
        }

        warn!(task = %task.id(), "completion guard dropped without signalling; finishing with error");
        match task.fail("completion guard dropped without signalling") {
            Ok(()) => {}
            // Someone else signalled between the check and our call.
            Err(QueueError::AlreadyFinished(_)) => {
                debug!(task = %task.id(), "task finished concurrently with guard drop");
            }
            Err(err) => {
                warn!(task = %task.id(), error = %err, "guard could not finish task");
            }
        }
    }
}
