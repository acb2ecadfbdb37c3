// src/dag/mod.rs

//! Dependency tracking and scheduling.
//!
//! - [`graph`] holds the dependency edges between unfinished tasks and
//!   rejects cycles.
//! - [`scheduler`] is the single-threaded admission-control state machine:
//!   readiness propagation, priority/FIFO selection and slot accounting.
//! - [`scheduler_step`] describes what a scheduler step wants done once the
//!   queue lock is released.

pub mod graph;
pub(crate) mod scheduler;
pub(crate) mod scheduler_step;

pub use graph::DependencyGraph;
