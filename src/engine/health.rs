//! Lock-free engine counters.
//! Bumped by submitters and the worker, read by `Engine::health`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct EngineHealth {
    /// Samples appended to a live window.
    samples_accepted: AtomicU64,
    /// Submissions ignored (empty metric name, engine stopped, poisoned lock).
    samples_ignored: AtomicU64,
    /// Epochs retired into the rotation queue.
    rotations: AtomicU64,
    /// Epochs turned into a summary set and pushed to history.
    epochs_summarized: AtomicU64,
    /// Retired epochs that held no samples and were discarded.
    epochs_empty: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub samples_accepted: u64,
    pub samples_ignored: u64,
    pub rotations: u64,
    pub epochs_summarized: u64,
    pub epochs_empty: u64,
    pub epochs_dropped: u64,
    pub pending_rotations: usize,
}

impl EngineHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_accepted(&self) {
        self.samples_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ignored(&self) {
        self.samples_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rotations(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_summarized(&self) {
        self.epochs_summarized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_empty(&self) {
        self.epochs_empty.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// `epochs_dropped` and `pending_rotations` live behind other locks, so
    /// the caller supplies them.
    pub fn snapshot(&self, epochs_dropped: u64, pending_rotations: usize) -> HealthSnapshot {
        HealthSnapshot {
            samples_accepted: self.samples_accepted.load(Ordering::Relaxed),
            samples_ignored: self.samples_ignored.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            epochs_summarized: self.epochs_summarized.load(Ordering::Relaxed),
            epochs_empty: self.epochs_empty.load(Ordering::Relaxed),
            epochs_dropped,
            pending_rotations,
        }
    }
}
