use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, trace};

use crate::engine::rotation::{Wake, WakeReceiver};
use crate::engine::summarizer;
use crate::engine::Shared;
use crate::window::WindowSet;

/// Background loop: rotate on time, wait for a wake or the poll timeout,
/// then summarize everything retired so far. Exits once the termination
/// flag is seen, after summarizing what is already queued.
pub(crate) fn run(shared: Arc<Shared>, wake_rx: WakeReceiver) {
    let poll = shared.config.poll_interval();
    info!(
        duration_ms = shared.config.duration_ms(),
        sample_count = shared.config.sample_count(),
        poll_ms = poll.as_millis() as u64,
        "aggregation worker started"
    );

    while !shared.terminating.load(Ordering::Acquire) {
        // Covers epochs that expire while nobody submits.
        shared.try_rotate();

        if wake_rx.wait(poll) == Wake::Closed {
            error!("wake channel closed, aggregation worker exiting");
            break;
        }

        process_pending(&shared);
    }

    let flushed = process_pending(&shared);
    info!(flushed, "aggregation worker stopped");
}

/// Drains the rotation queue and summarizes each retired set in order.
fn process_pending(shared: &Shared) -> usize {
    let retired = shared.queue.drain();
    let n = retired.len();
    for set in retired {
        process_one(shared, set);
    }
    n
}

fn process_one(shared: &Shared, set: WindowSet) {
    let started = Instant::now();
    let start_time = set.start_time();
    let samples = set.sample_count();

    let Some(summary) = summarizer::summarize(set) else {
        shared.health.inc_empty();
        trace!(start_time, "retired epoch had no samples, discarded");
        return;
    };
    shared.latency.record(started.elapsed());

    let metrics = summary.len();
    let evicted = match shared.history.lock() {
        Ok(mut history) => history.push(summary),
        Err(_) => {
            error!(start_time, samples, "history lock poisoned, summary dropped");
            return;
        }
    };
    shared.health.inc_summarized();

    debug!(
        start_time,
        metrics,
        samples,
        evicted,
        elapsed_us = started.elapsed().as_micros() as u64,
        "epoch summarized"
    );
}
