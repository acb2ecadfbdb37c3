// src/task/signal.rs

//! Completion Signal plumbing.
//!
//! Every state flip a scheduler cares about is published to the task's
//! observers *before* the flipping call returns, on whatever thread did the
//! flip. The owning queue is always the first observer; callers may add
//! their own for diagnostics.

use std::sync::{Arc, Mutex};

use crate::sync::lock;
use crate::task::drain;
use crate::task::TaskHandle;
use crate::types::LifecycleEvent;

/// Receives lifecycle events from tasks.
///
/// Implementations must be cheap and must not block: they run inline on
/// the thread that triggered the event, which may be a worker thread in
/// the middle of completing some unrelated job.
pub trait TaskObserver: Send + Sync {
    fn on_event(&self, task: &TaskHandle, event: LifecycleEvent);
}

impl<F> TaskObserver for F
where
    F: Fn(&TaskHandle, LifecycleEvent) + Send + Sync,
{
    fn on_event(&self, task: &TaskHandle, event: LifecycleEvent) {
        self(task, event)
    }
}

#[derive(Default)]
pub(crate) struct ObserverList {
    observers: Mutex<Vec<Arc<dyn TaskObserver>>>,
}

impl ObserverList {
    pub(crate) fn subscribe(&self, observer: Arc<dyn TaskObserver>) {
        lock(&self.observers).push(observer);
    }

    /// Deliver `event` to every observer, in subscription order.
    ///
    /// The list is snapshotted first so observers may subscribe further
    /// observers (or re-enter the task) without deadlocking. Queue work
    /// triggered by an observer waits until every observer has seen the
    /// event.
    pub(crate) fn publish(&self, task: &TaskHandle, event: LifecycleEvent) {
        let snapshot: Vec<Arc<dyn TaskObserver>> = lock(&self.observers).clone();
        drain::scope(|| {
            for observer in snapshot {
                observer.on_event(task, event);
            }
        });
    }
}
