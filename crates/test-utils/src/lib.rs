pub mod builders;
pub mod event_log;
pub mod manual_pool;

use std::sync::Once;
use std::time::Duration;

use serialq::{TaskHandle, TaskQueue};
use tracing_subscriber::{EnvFilter, fmt};

pub use event_log::EventLog;
pub use manual_pool::ManualPool;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=serialq=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_names(true)
            .init();
    });
}

/// Upper bound for anything a test waits on.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for the queue to drain, failing the test instead of hanging.
pub fn wait_idle(queue: &TaskQueue) {
    assert!(
        queue.wait_until_all_finished_timeout(TEST_TIMEOUT),
        "queue did not drain within {:?}: {:?}",
        TEST_TIMEOUT,
        queue
    );
}

/// Wait for one task to finish, failing the test instead of hanging.
pub fn wait_finished(task: &TaskHandle) {
    assert!(
        task.wait_timeout(TEST_TIMEOUT),
        "task did not finish within {:?}: {:?}",
        TEST_TIMEOUT,
        task
    );
}

/// Async flavour of [`wait_idle`] for `#[tokio::test]`s: waits on the
/// blocking pool so the runtime keeps driving the tasks being waited for.
pub async fn wait_idle_async(queue: &TaskQueue) {
    let waiter = queue.clone();
    let drained = tokio::task::spawn_blocking(move || {
        waiter.wait_until_all_finished_timeout(TEST_TIMEOUT)
    })
    .await
    .expect("waiter thread panicked");
    assert!(drained, "queue did not drain within {TEST_TIMEOUT:?}: {queue:?}");
}
