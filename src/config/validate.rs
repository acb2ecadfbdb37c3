// src/config/validate.rs

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{QueueError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = QueueError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let order = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.queue, raw.task, order))
    }
}

/// Validate and return the dependency-respecting submission order.
fn validate_raw_config(cfg: &RawConfigFile) -> Result<Vec<String>> {
    ensure_has_tasks(cfg)?;
    validate_queue_config(cfg)?;
    validate_task_dependencies(cfg)?;
    submission_order(cfg)
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(QueueError::Config(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_queue_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.queue.concurrency_limit == 0 {
        return Err(QueueError::Config(
            "[queue].concurrency_limit must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.cmd.trim().is_empty() {
            return Err(QueueError::Config(format!(
                "task '{}' has an empty `cmd`",
                name
            )));
        }
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(QueueError::Config(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(QueueError::Config(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

/// Dependency-respecting order: by dependency level, then by task name.
///
/// Submission order is the tie-break between ready tasks of equal
/// priority, so it must not depend on graph traversal details.
fn submission_order(cfg: &RawConfigFile) -> Result<Vec<String>> {
    // Edge direction: dep -> task, so a topological order lists every
    // dependency before the tasks waiting on it.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    let topo = toposort(&graph, None).map_err(|cycle| {
        QueueError::Config(format!(
            "cycle detected in task dependencies involving task '{}'",
            cycle.node_id()
        ))
    })?;

    // Level = longest chain of dependencies below a task. Within a level,
    // tasks keep the name order of the `[task.*]` table.
    let mut level: HashMap<&str, usize> = HashMap::new();
    for &name in &topo {
        let depth = graph
            .neighbors_directed(name, Direction::Incoming)
            .map(|dep| level.get(dep).map_or(0, |d| d + 1))
            .max()
            .unwrap_or(0);
        level.insert(name, depth);
    }

    let mut order: Vec<&str> = cfg.task.keys().map(String::as_str).collect();
    order.sort_by_key(|name| level.get(name).copied().unwrap_or(0));
    Ok(order.into_iter().map(str::to_string).collect())
}
