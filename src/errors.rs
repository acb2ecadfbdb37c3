// src/errors.rs

//! Crate-wide error types.
//!
//! [`QueueError`] covers usage errors reported by the queue itself.
//! [`TaskError`] is the payload a work body attaches when it finishes with
//! a failure; the queue never raises it, it only stores it for inspection.

use std::fmt;

use thiserror::Error;

use crate::types::{TaskId, TaskState};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("concurrency limit must be >= 1 (got {0})")]
    InvalidConcurrencyLimit(usize),

    #[error("dependency cycle: task {task} cannot depend on {dependency}")]
    DependencyCycle { task: TaskId, dependency: TaskId },

    #[error("task {0} is not known to this queue")]
    UnknownTask(TaskId),

    #[error("dependencies of task {task} are frozen (task is {state})")]
    DependenciesFrozen { task: TaskId, state: TaskState },

    #[error("task {0} already signalled completion")]
    AlreadyFinished(TaskId),

    #[error("task {task}: invalid transition {from} -> {to}")]
    InvalidTransition {
        task: TaskId,
        from: TaskState,
        to: TaskState,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Failure reported by a work body through `signal_finished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError {
    message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TaskError {}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Lets work bodies use `?` on queue calls, e.g. submitting a child task.
impl From<QueueError> for TaskError {
    fn from(err: QueueError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}
