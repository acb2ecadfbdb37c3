// src/dag/graph.rs

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{QueueError, Result};
use crate::types::TaskId;

/// Dependency edges between the unfinished tasks of one queue.
///
/// Edge direction is `dependency -> dependent`: for "B waits on A" we store
/// `A -> B`. Finished tasks are removed, so the graph only ever holds the
/// part of the DAG that can still influence readiness.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraphMap<TaskId, ()>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, id: TaskId) {
        self.graph.add_node(id);
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.graph.contains_node(id)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn has_dependency(&self, task: TaskId, dependency: TaskId) -> bool {
        self.graph.contains_edge(dependency, task)
    }

    /// Record that `task` waits on `dependency`.
    ///
    /// Rejected if it would make `task` its own transitive dependency, i.e.
    /// if `dependency` is already reachable from `task`. Both nodes must
    /// already be present.
    pub fn add_dependency(&mut self, task: TaskId, dependency: TaskId) -> Result<()> {
        if !self.contains(task) {
            return Err(QueueError::UnknownTask(task));
        }
        if !self.contains(dependency) {
            return Err(QueueError::UnknownTask(dependency));
        }

        if task == dependency || has_path_connecting(&self.graph, task, dependency, None) {
            return Err(QueueError::DependencyCycle { task, dependency });
        }

        self.graph.add_edge(dependency, task, ());
        Ok(())
    }

    /// Direct dependencies of a task that are still in the graph.
    pub fn dependencies_of(&self, id: TaskId) -> Vec<TaskId> {
        self.graph
            .neighbors_directed(id, Direction::Incoming)
            .collect()
    }

    /// Tasks that directly wait on `id`.
    pub fn dependents_of(&self, id: TaskId) -> Vec<TaskId> {
        self.graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect()
    }

    /// Drop a finished task together with all its edges.
    pub fn remove_task(&mut self, id: TaskId) {
        self.graph.remove_node(id);
    }
}
