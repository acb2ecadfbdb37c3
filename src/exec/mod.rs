// src/exec/mod.rs

//! Execution layer.
//!
//! - [`pool`] provides the `WorkerPool` seam the queue uses to run deferred
//!   work, plus thread and Tokio implementations.
//! - [`command`] turns configured shell commands into asynchronous work
//!   bodies for the `serialq` binary.

pub mod command;
pub mod pool;

pub use command::{CommandSpec, command_body};
pub use pool::{Job, ThreadWorkerPool, TokioWorkerPool, WorkerPool, run_to_completion};
