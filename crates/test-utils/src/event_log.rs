use std::sync::{Arc, Mutex};

/// Thread-safe, append-only list of markers such as `"begin A"` or
/// `"end B"`, for asserting on interleavings.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the first occurrence of `event`.
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events.lock().unwrap().iter().position(|e| e == event)
    }

    pub fn contains(&self, event: &str) -> bool {
        self.position(event).is_some()
    }

    /// Assert that `first` was logged strictly before `second`.
    pub fn assert_before(&self, first: &str, second: &str) {
        let snapshot = self.snapshot();
        let a = snapshot.iter().position(|e| e == first);
        let b = snapshot.iter().position(|e| e == second);
        match (a, b) {
            (Some(a), Some(b)) => assert!(
                a < b,
                "expected {first:?} before {second:?}, got {snapshot:?}"
            ),
            _ => panic!("missing {first:?} or {second:?} in {snapshot:?}"),
        }
    }
}
