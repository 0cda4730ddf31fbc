use std::collections::BTreeMap;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Statistics for one metric over one completed epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Epoch start, unix seconds.
    pub start_time: i64,
    pub duration_ms: u64,
    pub count: u64,
    pub sum: i64,
    /// `sum / count`, truncated toward zero.
    pub avg: i32,
    pub min: i32,
    pub max: i32,
    pub p10: i32,
    pub p50: i32,
    pub p99: i32,
    pub p999: i32,
    /// Samples per second: `count * 1000 / duration_ms`, truncated.
    pub throughput: u64,
}

// ---------------------------------------------------------------------------
// SummarySet
// ---------------------------------------------------------------------------

/// Every metric's summary for one completed epoch, ordered by metric name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummarySet {
    pub start_time: i64,
    pub duration_ms: u64,
    pub metrics: BTreeMap<String, Summary>,
}

impl SummarySet {
    pub fn new(start_time: i64, duration_ms: u64) -> Self {
        Self { start_time, duration_ms, metrics: BTreeMap::new() }
    }

    pub fn get(&self, metric: &str) -> Option<&Summary> {
        self.metrics.get(metric)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Summary)> {
        self.metrics.iter().map(|(name, s)| (name.as_str(), s))
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Owned copy of the retained history, safe to hold without any engine lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistorySnapshot {
    pub duration_ms: u64,
    pub sample_count: usize,
    pub dropped_count: u64,
    /// Oldest epoch first.
    pub epochs: Vec<SummarySet>,
}

impl HistorySnapshot {
    /// Sum of `count` for `metric` over every retained epoch.
    pub fn total_count(&self, metric: &str) -> u64 {
        self.epochs
            .iter()
            .filter_map(|set| set.get(metric))
            .map(|s| s.count)
            .sum()
    }
}
