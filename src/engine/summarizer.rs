use crate::stats::{Moments, Percentiles};
use crate::types::{Summary, SummarySet};
use crate::window::{Window, WindowSet};

/// Summarizes one retired window. Selection reorders the window in place,
/// which is fine because the window is consumed. None for an empty window.
pub fn summarize_window(mut window: Window) -> Option<Summary> {
    let moments = Moments::scan(window.values())?;
    let percentiles = Percentiles::select(window.values_mut())?;
    let duration_ms = window.duration_ms();

    Some(Summary {
        start_time: window.start_time(),
        duration_ms,
        count: moments.count,
        sum: moments.sum,
        avg: moments.avg,
        min: moments.min,
        max: moments.max,
        p10: percentiles.p10,
        p50: percentiles.p50,
        p99: percentiles.p99,
        p999: percentiles.p999,
        throughput: moments.count.saturating_mul(1000).checked_div(duration_ms).unwrap_or(0),
    })
}

/// Consumes a retired set. Empty windows are skipped; a set with no samples
/// at all yields None so it never occupies a history slot.
pub fn summarize(set: WindowSet) -> Option<SummarySet> {
    let mut out = SummarySet::new(set.start_time(), set.duration_ms());
    for (metric, window) in set.into_windows() {
        if let Some(summary) = summarize_window(window) {
            out.metrics.insert(metric, summary);
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}
