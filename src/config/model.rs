// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::Priority;

/// Top-level task file as read from TOML, before validation.
///
/// ```toml
/// [queue]
/// concurrency_limit = 2
///
/// [task.fetch]
/// cmd = "curl -sSfO https://example.com/data.tar.gz"
/// priority = 5
///
/// [task.unpack]
/// cmd = "tar xzf data.tar.gz"
/// after = ["fetch"]
/// ```
///
/// Every section is optional except at least one `[task.<name>]`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Queue behaviour from `[queue]`.
    #[serde(default)]
    pub queue: QueueConfig,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[queue]` section. Also accepted directly by
/// [`TaskQueue::from_config`](crate::engine::TaskQueue::from_config).
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of tasks executing at once. 1 means strict
    /// serialization.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Optional name, used in logs.
    #[serde(default)]
    pub name: Option<String>,

    /// If true, a task whose dependency failed cancels itself instead of
    /// running. By default dependents run regardless.
    #[serde(default)]
    pub skip_dependents_on_failure: bool,
}

fn default_concurrency_limit() -> usize {
    1
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            name: None,
            skip_dependents_on_failure: false,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Shell command to run.
    pub cmd: String,

    /// Tasks that must finish before this one may start.
    #[serde(default)]
    pub after: Vec<String>,

    /// Higher runs first among ready tasks.
    #[serde(default)]
    pub priority: Priority,
}

/// A validated configuration.
///
/// Construct via `TryFrom<RawConfigFile>`; that is where dependency
/// references and acyclicity are checked.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub queue: QueueConfig,
    pub task: BTreeMap<String, TaskConfig>,
    /// Task names in an order where every task follows its dependencies.
    order: Vec<String>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        queue: QueueConfig,
        task: BTreeMap<String, TaskConfig>,
        order: Vec<String>,
    ) -> Self {
        Self { queue, task, order }
    }

    /// Task names in submission order: grouped by dependency level (tasks
    /// with no `after` first), alphabetical within a level.
    pub fn submission_order(&self) -> &[String] {
        &self.order
    }
}
