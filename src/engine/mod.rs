// src/engine/mod.rs

//! The thread-safe queue.
//!
//! [`TaskQueue`] owns the scheduler behind a single mutex (the critical
//! section for dispatch, slot accounting and readiness). It subscribes to
//! every task it admits and reacts to their lifecycle events, so a slot is
//! freed only when a task explicitly signals completion, never when its
//! work body merely returns.

pub mod queue;

pub use queue::{TaskOptions, TaskQueue};
