// src/sync.rs

//! Thin wrappers over `std::sync` primitives.
//!
//! Work bodies never run while one of these locks is held, so a poisoned
//! lock can only come from a bug inside the queue itself. We keep going
//! with the inner value rather than cascading the panic into every thread
//! that later signals completion.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn wait<'a, T>(cv: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cv.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

/// Returns the guard and whether the wait timed out.
pub(crate) fn wait_timeout<'a, T>(
    cv: &Condvar,
    guard: MutexGuard<'a, T>,
    timeout: Duration,
) -> (MutexGuard<'a, T>, bool) {
    match cv.wait_timeout(guard, timeout) {
        Ok((guard, res)) => (guard, res.timed_out()),
        Err(poisoned) => {
            let (guard, res) = poisoned.into_inner();
            (guard, res.timed_out())
        }
    }
}
