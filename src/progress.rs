use std::sync::Mutex;

use serde::Serialize;

/// Point-in-time accounting for the in-flight batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub total: u64,
    pub completed: u64,
}

/// Process-wide batch counters, mutated by ingestion workers and read by the
/// broadcaster. A single lock keeps `total` and `completed` a matched pair:
/// a snapshot never mixes values from two different updates.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    inner: Mutex<BatchProgress>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self, total: u64) {
        let mut inner = self.lock();
        *inner = BatchProgress { total, completed: 0 };
    }

    pub fn advance(&self, by: u64) {
        let mut inner = self.lock();
        inner.completed = (inner.completed + by).min(inner.total);
    }

    pub fn snapshot(&self) -> BatchProgress {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BatchProgress> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
