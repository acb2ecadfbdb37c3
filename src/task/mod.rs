// src/task/mod.rs

//! Tasks and their lifecycle.
//!
//! - [`state`] holds the pure transition rules.
//! - [`signal`] is the observer list that carries lifecycle events (most
//!   importantly `Finished`) to the owning queue.
//! - [`handle`] is the public, thread-safe [`TaskHandle`].
//! - [`guard`] provides [`CompletionGuard`] for work bodies with many exits.
//! - `drain` runs deferred starts outside locks and event delivery, with
//!   work bodies never held back behind another body.

pub(crate) mod drain;
pub mod guard;
pub mod handle;
pub mod signal;
pub(crate) mod state;

pub use guard::CompletionGuard;
pub use handle::{TaskHandle, WorkBody};
pub use signal::TaskObserver;
