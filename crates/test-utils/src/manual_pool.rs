use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serialq::WorkerPool;
use serialq::exec::Job;

/// A worker pool that only queues jobs. Tests decide when each job runs,
/// which makes "asynchronous" completion fully deterministic.
#[derive(Clone, Default)]
pub struct ManualPool {
    jobs: Arc<Mutex<VecDeque<Job>>>,
}

impl ManualPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs handed over but not yet run.
    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Run the oldest pending job on the calling thread.
    pub fn run_next(&self) -> bool {
        // Release the lock before running: the job may start tasks that
        // enqueue more jobs.
        let job = self.jobs.lock().unwrap().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run the oldest pending job on a fresh thread and wait for it.
    pub fn run_next_on_thread(&self) -> bool {
        let job = self.jobs.lock().unwrap().pop_front();
        match job {
            Some(job) => {
                std::thread::spawn(job).join().unwrap();
                true
            }
            None => false,
        }
    }

    /// Keep running jobs until none are left, including ones enqueued by
    /// earlier jobs. Returns how many ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl WorkerPool for ManualPool {
    fn execute(&self, job: Job) {
        self.jobs.lock().unwrap().push_back(job);
    }
}
