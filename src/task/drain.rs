// src/task/drain.rs

//! Per-thread queue of work that must not run inside the current call.
//!
//! Starting a task and announcing a skipped task both invoke caller code
//! (work bodies, observers). Neither may happen while the queue lock is
//! held, and neither should happen in the middle of delivering another
//! event to observers. Such work is handed to [`defer`] and runs once the
//! outermost [`scope`] on this thread unwinds, before the call that opened
//! the scope returns.
//!
//! Work bodies themselves run with no scope open, so a body that submits,
//! signals or cancels gets its follow-up starts dispatched right away.
//!
//! The one exception is [`tail`]: the final signal of a body run through
//! `run_to_completion` happens when nothing but returning is left to do, so
//! the starts it triggers are handed back to the loop that is running the
//! body. That keeps long chains of synchronous tasks flat.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::mem;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::task::TaskHandle;
use crate::types::{LifecycleEvent, TaskId};

/// Work queued by the scheduler for after its lock is released.
pub(crate) enum Deferred {
    /// Publish `ExecutingStarted` and run the work body.
    Start(TaskHandle),
    /// Publish `Finished` for a task that was skipped.
    PublishFinished(TaskHandle),
}

thread_local! {
    /// `Some` while a scope is open on this thread.
    static DRAIN: RefCell<Option<VecDeque<Deferred>>> = const { RefCell::new(None) };

    /// Set while a drain loop runs a task's body: the task, and the starts
    /// its tail signal handed back to that loop.
    static HANDOFF: RefCell<Option<(TaskId, Vec<Deferred>)>> = const { RefCell::new(None) };
}

/// Queue `actions` behind whatever the current thread is doing. With no
/// scope open they run before this returns.
pub(crate) fn defer(actions: Vec<Deferred>) {
    if actions.is_empty() {
        return;
    }
    scope(|| {
        DRAIN.with(|cell| {
            if let Some(queue) = cell.borrow_mut().as_mut() {
                queue.extend(actions);
            }
        })
    });
}

/// Run `f`. If this is the outermost scope on the thread, afterwards run
/// everything deferred during `f` (and anything those actions defer).
///
/// A panic in `f` is re-raised only after the deferred work has run, so a
/// misbehaving observer cannot strand task starts.
pub(crate) fn scope<R>(f: impl FnOnce() -> R) -> R {
    let outermost = DRAIN.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_some() {
            false
        } else {
            *slot = Some(VecDeque::new());
            true
        }
    });

    if !outermost {
        return f();
    }

    let result = panic::catch_unwind(AssertUnwindSafe(f));

    loop {
        let next = DRAIN.with(|cell| cell.borrow_mut().as_mut().and_then(VecDeque::pop_front));
        match next {
            Some(Deferred::Start(task)) => run_start(task),
            Some(Deferred::PublishFinished(task)) => {
                let published =
                    panic::catch_unwind(AssertUnwindSafe(|| task.publish(LifecycleEvent::Finished)));
                if published.is_err() {
                    error!(task = %task.id(), "observer panicked while announcing skipped task");
                }
            }
            None => break,
        }
    }

    DRAIN.with(|cell| *cell.borrow_mut() = None);

    match result {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// Run one task's body with the scope parked, so queue calls made by the
/// body are not held back behind it.
fn run_start(task: TaskHandle) {
    let parked = DRAIN.with(|cell| cell.borrow_mut().take());
    let outer = HANDOFF.with(|cell| cell.borrow_mut().replace((task.id(), Vec::new())));

    if panic::catch_unwind(AssertUnwindSafe(|| task.run_body())).is_err() {
        error!(task = %task.id(), "panic while starting task");
    }

    let handed = HANDOFF.with(|cell| mem::replace(&mut *cell.borrow_mut(), outer));
    let mut queue = parked.unwrap_or_default();
    if let Some((_, actions)) = handed {
        queue.extend(actions);
    }
    DRAIN.with(|cell| *cell.borrow_mut() = Some(queue));
}

/// Run `f`, the last thing `task`'s body does. If a drain loop on this
/// thread is running that body, whatever `f` defers is handed back to the
/// loop instead of running nested inside `f`.
pub(crate) fn tail<R>(task: TaskId, f: impl FnOnce() -> R) -> R {
    let armed = HANDOFF.with(|cell| matches!(&*cell.borrow(), Some((id, _)) if *id == task))
        && DRAIN.with(|cell| cell.borrow().is_none());
    if !armed {
        return f();
    }

    DRAIN.with(|cell| *cell.borrow_mut() = Some(VecDeque::new()));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    let collected = DRAIN.with(|cell| cell.borrow_mut().take()).unwrap_or_default();
    HANDOFF.with(|cell| {
        if let Some((_, actions)) = cell.borrow_mut().as_mut() {
            actions.extend(collected);
        }
    });

    match result {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}
