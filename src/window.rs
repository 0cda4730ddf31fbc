use std::collections::HashMap;

use crate::config::{INITIAL_WINDOW_CAPACITY, SUCCESSOR_RESERVE_DEN, SUCCESSOR_RESERVE_NUM};

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// One metric's samples for one epoch, in submission order.
#[derive(Debug, Clone)]
pub struct Window {
    start_time: i64,
    duration_ms: u64,
    values: Vec<i32>,
}

impl Window {
    pub fn with_capacity(start_time: i64, duration_ms: u64, capacity: usize) -> Self {
        Self { start_time, duration_ms, values: Vec::with_capacity(capacity) }
    }

    #[inline]
    pub fn push(&mut self, value: i32) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    /// Mutable access for in-place selection once the window is retired.
    pub fn values_mut(&mut self) -> &mut [i32] {
        &mut self.values
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

// ---------------------------------------------------------------------------
// WindowSet
// ---------------------------------------------------------------------------

/// All metrics' windows for one epoch. Every window shares the set's start
/// time and duration.
#[derive(Debug, Clone)]
pub struct WindowSet {
    start_time: i64,
    duration_ms: u64,
    windows: HashMap<String, Window>,
}

impl WindowSet {
    pub fn new(start_time: i64, duration_ms: u64) -> Self {
        Self { start_time, duration_ms, windows: HashMap::new() }
    }

    /// Appends `value` to `metric`'s window, creating it on first use.
    /// The name is only copied when the window does not exist yet.
    pub fn record(&mut self, metric: &str, value: i32) {
        if let Some(window) = self.windows.get_mut(metric) {
            window.push(value);
        } else {
            let mut window =
                Window::with_capacity(self.start_time, self.duration_ms, INITIAL_WINDOW_CAPACITY);
            window.push(value);
            self.windows.insert(metric.to_string(), window);
        }
    }

    /// Fresh set for the next epoch, pre-sized from this one: every metric
    /// that received samples gets an empty window with ~1.2x its length
    /// reserved. Metrics with no samples are not carried over.
    pub fn successor(&self, start_time: i64) -> Self {
        let windows = self
            .windows
            .iter()
            .filter(|(_, w)| !w.is_empty())
            .map(|(name, w)| {
                let reserve = w.len() * SUCCESSOR_RESERVE_NUM / SUCCESSOR_RESERVE_DEN;
                (name.clone(), Window::with_capacity(start_time, self.duration_ms, reserve))
            })
            .collect();
        Self { start_time, duration_ms: self.duration_ms, windows }
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn get(&self, metric: &str) -> Option<&Window> {
        self.windows.get(metric)
    }

    pub fn metric_count(&self) -> usize {
        self.windows.len()
    }

    /// Total samples across all metrics.
    pub fn sample_count(&self) -> usize {
        self.windows.values().map(Window::len).sum()
    }

    /// True when no metric holds a sample (seeded empty windows included).
    pub fn is_empty(&self) -> bool {
        self.windows.values().all(Window::is_empty)
    }

    pub fn into_windows(self) -> impl Iterator<Item = (String, Window)> {
        self.windows.into_iter()
    }
}
