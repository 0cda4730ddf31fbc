use std::collections::VecDeque;

use crate::types::{HistorySnapshot, SummarySet};

/// Bounded FIFO of summarized epochs. Oldest entries are evicted once the
/// capacity is exceeded and counted in `dropped_count`.
#[derive(Debug)]
pub struct History {
    capacity: usize,
    entries: VecDeque<SummarySet>,
    dropped_count: u64,
}

impl History {
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024) + 1),
            dropped_count: 0,
        }
    }

    /// Appends and evicts down to capacity. Returns how many were evicted.
    pub fn push(&mut self, set: SummarySet) -> usize {
        self.entries.push_back(set);
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.dropped_count = self.dropped_count.saturating_add(1);
            evicted += 1;
        }
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SummarySet> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&SummarySet> {
        self.entries.back()
    }

    pub fn snapshot(&self, duration_ms: u64) -> HistorySnapshot {
        HistorySnapshot {
            duration_ms,
            sample_count: self.capacity,
            dropped_count: self.dropped_count,
            epochs: self.entries.iter().cloned().collect(),
        }
    }
}
