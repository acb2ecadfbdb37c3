// tests/reentrant_bodies.rs
//
// Work bodies that call back into their own queue while still running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use serialq::{LifecycleEvent, TaskHandle, TaskOptions, TaskQueue, TaskState, ThreadWorkerPool};
use serialq_test_utils::{EventLog, ManualPool, TEST_TIMEOUT, init_tracing, wait_idle};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn child_submitted_from_a_body_starts_before_submit_returns() -> TestResult {
    init_tracing();
    let queue = TaskQueue::new(2)?;
    let pool = ManualPool::new();
    let log = EventLog::new();

    let (q, p, l) = (queue.clone(), pool.clone(), log.clone());
    let parent = queue.submit_sync(TaskOptions::new().label("parent"), move |_| {
        let sync_log = l.clone();
        let sync_child = q.submit_sync(TaskOptions::new(), move |_| {
            sync_log.push("sync child ran");
            Ok(())
        })?;
        l.push("submit returned");
        assert!(sync_child.is_finished());

        let async_child = q.submit_async(&p, TaskOptions::new(), |_| Ok(()))?;
        // The body was invoked: its job is already with the pool.
        assert_eq!(async_child.state(), TaskState::Executing);
        assert_eq!(p.pending(), 1);
        Ok(())
    })?;

    assert!(parent.is_finished());
    assert!(parent.error().is_none(), "{:?}", parent.error());
    assert_eq!(log.snapshot(), ["sync child ran", "submit returned"]);

    pool.run_all();
    wait_idle(&queue);
    Ok(())
}

#[test]
fn body_can_submit_a_child_and_wait_for_it() -> TestResult {
    init_tracing();
    let queue = TaskQueue::new(2)?;
    let pool = ThreadWorkerPool::named("child");
    let child_done = Arc::new(AtomicBool::new(false));

    let (q, done) = (queue.clone(), Arc::clone(&child_done));
    let parent = queue.submit_sync(TaskOptions::new().label("parent"), move |_| {
        let child = q.submit_async(&pool, TaskOptions::new().label("child"), |_| {
            thread::sleep(Duration::from_millis(5));
            Ok(())
        })?;
        done.store(child.wait_timeout(TEST_TIMEOUT), Ordering::SeqCst);
        Ok(())
    })?;

    wait_idle(&queue);
    assert!(parent.is_finished());
    assert!(child_done.load(Ordering::SeqCst), "child never ran while parent waited");
    Ok(())
}

#[test]
fn body_that_keeps_working_after_signalling_does_not_hold_back_the_next_task() -> TestResult {
    init_tracing();
    let queue = TaskQueue::new(1)?;
    let pool = ThreadWorkerPool::named("next");
    let next_slot: Arc<OnceLock<TaskHandle>> = Arc::default();
    let saw_next_finish = Arc::new(AtomicBool::new(false));
    queue.suspend();

    let (slot, saw) = (Arc::clone(&next_slot), Arc::clone(&saw_next_finish));
    let first = queue.submit(
        move |task| {
            task.succeed().unwrap();
            // Still running: the next task must already be under way.
            let next = slot.get().expect("next task registered before resume");
            saw.store(next.wait_timeout(TEST_TIMEOUT), Ordering::SeqCst);
        },
        &[],
        0,
    )?;
    let next = queue.submit_async(&pool, TaskOptions::new(), |_| Ok(()))?;
    next_slot.set(next.clone()).unwrap();

    queue.resume();
    wait_idle(&queue);
    assert!(first.is_finished());
    assert!(saw_next_finish.load(Ordering::SeqCst));
    Ok(())
}

#[test]
fn executing_started_is_observed_before_dispatching_call_returns() -> TestResult {
    init_tracing();
    let queue = TaskQueue::new(2)?;
    let log = EventLog::new();

    let (q, l) = (queue.clone(), log.clone());
    queue.submit_sync(TaskOptions::new(), move |_| {
        q.suspend();
        let child_log = l.clone();
        let child = q.submit_sync(TaskOptions::new(), move |_| {
            child_log.push("child body");
            Ok(())
        })?;

        let observer_log = l.clone();
        child.subscribe(Arc::new(move |_: &TaskHandle, event: LifecycleEvent| {
            observer_log.push(format!("{event:?}"));
        }));

        q.resume();
        l.push("resume returned");
        Ok(())
    })?;

    wait_idle(&queue);
    assert_eq!(
        log.snapshot(),
        ["ExecutingStarted", "child body", "Finished", "resume returned"]
    );
    Ok(())
}
