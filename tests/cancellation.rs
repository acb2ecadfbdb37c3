// tests/cancellation.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use serialq::{TaskError, TaskHandle, TaskOptions, TaskQueue, TaskState, ThreadWorkerPool};
use serialq_test_utils::{EventLog, ManualPool, init_tracing, wait_idle};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn cancelled_ready_task_never_runs_and_does_not_block_the_queue() -> TestResult {
    init_tracing();
    let queue = TaskQueue::new(1)?;
    let pool = ManualPool::new();
    let log = EventLog::new();

    let a = queue.submit_async(&pool, TaskOptions::new().label("A"), |_| Ok(()))?;
    let b_log = log.clone();
    let b = queue.submit_sync(TaskOptions::new().label("B"), move |_| {
        b_log.push("B ran");
        Ok(())
    })?;
    let c_log = log.clone();
    let c = queue.submit_sync(TaskOptions::new().label("C"), move |_| {
        c_log.push("C ran");
        Ok(())
    })?;

    queue.cancel(&b);

    // Finished on the spot, without ever taking A's slot.
    assert_eq!(b.state(), TaskState::Finished);
    assert!(b.is_cancelled());
    assert!(b.was_skipped());
    assert!(b.error().is_none());
    assert_eq!(queue.active_count(), 1);
    assert!(a.is_executing());

    pool.run_all();
    wait_idle(&queue);
    assert!(c.is_finished());
    assert_eq!(log.snapshot(), ["C ran"]);
    Ok(())
}

#[test]
fn cancelling_a_pending_task_releases_its_dependents() -> TestResult {
    init_tracing();
    let queue = TaskQueue::new(1)?;
    let pool = ManualPool::new();

    let gate = queue.submit_async(&pool, TaskOptions::new(), |_| Ok(()))?;
    let x = queue.submit_sync(TaskOptions::new().after(&gate), |_| Ok(()))?;
    let y = queue.submit_sync(TaskOptions::new().after(&x), |_| Ok(()))?;
    assert!(x.is_pending() && y.is_pending());

    x.cancel();
    assert!(x.is_finished() && x.was_skipped());
    assert!(y.is_ready(), "y only waited on x");

    pool.run_all();
    wait_idle(&queue);
    assert!(y.is_finished());
    assert!(!y.was_skipped());
    assert!(y.failed_dependencies().is_empty());
    Ok(())
}

#[test]
fn cancelling_an_executing_task_is_cooperative() -> TestResult {
    init_tracing();
    let queue = TaskQueue::new(1)?;
    let pool = ManualPool::new();
    let saw_flag = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&saw_flag);
    let task = queue.submit_async(&pool, TaskOptions::new(), move |task| {
        flag.store(task.is_cancelled(), Ordering::SeqCst);
        Err("stopped early".into())
    })?;
    assert!(task.is_executing());

    task.cancel();
    assert!(task.is_cancelled());
    assert!(task.is_executing(), "cancel must not finish a running task");
    assert_eq!(queue.active_count(), 1);

    pool.run_next();
    assert!(saw_flag.load(Ordering::SeqCst));
    assert!(task.is_finished());
    assert!(!task.was_skipped());
    assert_eq!(task.error().map(|e| e.to_string()).as_deref(), Some("stopped early"));
    assert_eq!(queue.active_count(), 0);
    Ok(())
}

#[test]
fn cancel_after_finish_is_a_no_op() -> TestResult {
    init_tracing();
    let queue = TaskQueue::new(1)?;

    let task = queue.submit_sync(TaskOptions::new(), |_| Ok(()))?;
    assert!(task.is_finished());

    task.cancel();
    assert!(!task.is_cancelled());
    assert!(!task.was_skipped());
    Ok(())
}

#[test]
fn cancelled_task_never_holds_a_slot() -> TestResult {
    init_tracing();
    let queue = TaskQueue::new(1)?;
    let ran = Arc::new(AtomicUsize::new(0));
    queue.suspend();

    let r = Arc::clone(&ran);
    let a = queue.submit_sync(TaskOptions::new(), move |_| {
        r.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })?;
    let r = Arc::clone(&ran);
    let b = queue.submit_sync(TaskOptions::new(), move |_| {
        r.fetch_add(10, Ordering::SeqCst);
        Ok(())
    })?;

    a.cancel();
    assert_eq!(queue.active_count(), 0);
    assert_eq!(queue.unfinished_count(), 1);

    queue.resume();
    wait_idle(&queue);
    assert!(a.was_skipped());
    assert!(b.is_finished() && !b.was_skipped());
    assert_eq!(ran.load(Ordering::SeqCst), 10);
    Ok(())
}

#[test]
fn cancel_all_skips_everything_not_started() -> TestResult {
    init_tracing();
    let queue = TaskQueue::new(1)?;
    let pool = ManualPool::new();

    let running = queue.submit_async(&pool, TaskOptions::new(), |_| Ok(()))?;
    let waiting: Vec<_> = (0..3)
        .map(|_| queue.submit_sync(TaskOptions::new().after(&running), |_| Ok(())))
        .collect::<Result<_, _>>()?;

    queue.cancel_all();
    assert!(waiting.iter().all(|t| t.is_finished() && t.was_skipped()));
    assert!(running.is_cancelled() && running.is_executing());

    pool.run_all();
    wait_idle(&queue);
    assert!(running.is_finished());
    Ok(())
}

/// Cancelling from another thread while the queue is busy: every task ends
/// up either run exactly once or skipped, never both, never neither.
#[test]
fn concurrent_cancel_either_runs_or_skips_each_task() -> TestResult {
    init_tracing();
    let queue = TaskQueue::new(2)?;
    let pool = ThreadWorkerPool::named("cancel-race");

    let mut tasks = Vec::new();
    let mut counters = Vec::new();
    for i in 0..60 {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let work = move |_: &TaskHandle| -> Result<(), TaskError> {
            r.fetch_add(1, Ordering::SeqCst);
            thread::yield_now();
            Ok(())
        };
        let task = if i % 2 == 0 {
            queue.submit_async(&pool, TaskOptions::new(), work)?
        } else {
            queue.submit_sync(TaskOptions::new(), work)?
        };
        tasks.push(task);
        counters.push(runs);
    }

    let to_cancel: Vec<_> = tasks.iter().step_by(3).cloned().collect();
    let canceller = thread::spawn(move || {
        for task in to_cancel {
            task.cancel();
        }
    });
    canceller.join().unwrap();

    wait_idle(&queue);
    for (task, runs) in tasks.iter().zip(&counters) {
        assert!(task.is_finished());
        let ran = runs.load(Ordering::SeqCst);
        if task.was_skipped() {
            assert_eq!(ran, 0, "{task:?} was skipped but its body ran");
        } else {
            assert_eq!(ran, 1, "{task:?} finished without running exactly once");
        }
    }
    assert_eq!(queue.active_count(), 0);
    Ok(())
}
