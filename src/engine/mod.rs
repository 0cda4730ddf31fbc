//! The aggregation engine.
//!
//! Submitters append into the live [`WindowSet`] under the submission lock.
//! When the epoch has expired the set is retired into the [`RotationQueue`]
//! and the worker is woken; the worker also checks expiry on every poll so
//! idle epochs still close. Summaries land in [`History`], which has its own
//! lock and is the only thing reports read.
//!
//! Lock order: submission → rotation queue. The history lock is never held
//! together with either.

pub mod health;
pub mod history;
pub mod rotation;
pub mod summarizer;
mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{error, info, trace, warn};

use crate::clock;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::latency::LatencyStats;
use crate::report;
use crate::types::HistorySnapshot;
use crate::window::WindowSet;

use self::health::{EngineHealth, HealthSnapshot};
use self::history::History;
use self::rotation::{wake_channel, RotationQueue, Waker};

const WORKER_THREAD_NAME: &str = "epochstat-worker";

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// The active epoch. Guarded by the submission lock.
struct LiveEpoch {
    /// Monotonic start, used for expiry.
    started_at: Instant,
    /// Wall-clock start in unix seconds, stamped on windows and summaries.
    start_time: i64,
    /// Created by the first sample of the epoch, or seeded at rotation.
    windows: Option<WindowSet>,
}

impl LiveEpoch {
    fn starting_now() -> Self {
        Self { started_at: Instant::now(), start_time: clock::unix_secs(), windows: None }
    }
}

pub(crate) struct Shared {
    config: EngineConfig,
    live: Mutex<LiveEpoch>,
    queue: RotationQueue,
    waker: Waker,
    history: Mutex<History>,
    health: EngineHealth,
    latency: LatencyStats,
    terminating: AtomicBool,
}

impl Shared {
    fn new(config: EngineConfig, waker: Waker) -> Self {
        Self {
            config,
            live: Mutex::new(LiveEpoch::starting_now()),
            queue: RotationQueue::new(),
            waker,
            history: Mutex::new(History::new(config.sample_count())),
            health: EngineHealth::new(),
            latency: LatencyStats::new(),
            terminating: AtomicBool::new(false),
        }
    }

    fn submit(&self, metric: &str, value: i32) {
        let rotated = {
            let Ok(mut live) = self.live.lock() else {
                error!(metric, "submission lock poisoned, sample dropped");
                self.health.inc_ignored();
                return;
            };
            let (start_time, duration_ms) = (live.start_time, self.config.duration_ms());
            live.windows
                .get_or_insert_with(|| WindowSet::new(start_time, duration_ms))
                .record(metric, value);
            self.health.inc_accepted();
            self.rotate_locked(&mut live, false)
        };
        if rotated {
            self.waker.wake();
        }
    }

    /// Rotation check from the worker side.
    fn try_rotate(&self) -> bool {
        let rotated = match self.live.lock() {
            Ok(mut live) => self.rotate_locked(&mut live, false),
            Err(_) => {
                error!("submission lock poisoned, rotation skipped");
                false
            }
        };
        if rotated {
            self.waker.wake();
        }
        rotated
    }

    /// Retires the live set into the queue if the epoch has expired (or
    /// `force` is set) and starts a new epoch seeded from the old one.
    /// Caller holds the submission lock and signals the worker after
    /// releasing it.
    fn rotate_locked(&self, live: &mut LiveEpoch, force: bool) -> bool {
        if !force && live.started_at.elapsed() < self.config.duration() {
            return false;
        }

        let duration_ms = self.config.duration_ms();
        let retired = live
            .windows
            .take()
            .unwrap_or_else(|| WindowSet::new(live.start_time, duration_ms));

        live.started_at = Instant::now();
        live.start_time = clock::unix_secs();
        live.windows = Some(retired.successor(live.start_time));

        trace!(
            retired_start = retired.start_time(),
            metrics = retired.metric_count(),
            samples = retired.sample_count(),
            "epoch rotated"
        );
        if self.queue.push(retired) {
            self.health.inc_rotations();
        }
        true
    }

    #[cfg(test)]
    fn rotate_now(&self) {
        let rotated = match self.live.lock() {
            Ok(mut live) => self.rotate_locked(&mut live, true),
            Err(_) => false,
        };
        if rotated {
            self.waker.wake();
        }
    }

    fn lock_history(&self) -> Option<MutexGuard<'_, History>> {
        match self.history.lock() {
            Ok(history) => Some(history),
            Err(_) => {
                error!("history lock poisoned");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Engine handle
// ---------------------------------------------------------------------------

/// Handle to one aggregation engine. Uninitialized until [`Engine::init`];
/// dropping it terminates the worker.
pub struct Engine {
    shared: OnceLock<Arc<Shared>>,
    /// Also serializes init and terminate.
    worker: Mutex<Option<JoinHandle<()>>>,
    terminated: AtomicBool,
}

impl Engine {
    pub fn new() -> Self {
        Self { shared: OnceLock::new(), worker: Mutex::new(None), terminated: AtomicBool::new(false) }
    }

    /// New handle, initialized with `config`.
    pub fn start(config: EngineConfig) -> Result<Self> {
        let engine = Self::new();
        engine.init(config)?;
        Ok(engine)
    }

    /// Starts the worker. A repeated call while running is a no-op that keeps
    /// the first configuration. Termination is final.
    pub fn init(&self, config: EngineConfig) -> Result<()> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);

        if self.terminated.load(Ordering::Acquire) {
            warn!("init called after terminate");
            return Err(EngineError::Terminated);
        }
        if let Some(shared) = self.shared.get() {
            info!(
                duration_ms = shared.config.duration_ms(),
                sample_count = shared.config.sample_count(),
                "engine already initialized"
            );
            return Ok(());
        }

        let (waker, wake_rx) = wake_channel();
        let shared = Arc::new(Shared::new(config, waker));
        let handle = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(WORKER_THREAD_NAME.to_string())
                .spawn(move || worker::run(shared, wake_rx))
                .map_err(EngineError::WorkerSpawn)?
        };

        // Only reachable once: guarded by the worker lock above.
        let _ = self.shared.set(shared);
        *worker = Some(handle);

        info!(
            duration_ms = config.duration_ms(),
            sample_count = config.sample_count(),
            "engine initialized"
        );
        Ok(())
    }

    /// 60 s windows, one retained summary.
    pub fn init_default(&self) -> Result<()> {
        self.init(EngineConfig::default())
    }

    pub fn init_secs(&self, duration_secs: u32, sample_count: u32) -> Result<()> {
        self.init(EngineConfig::from_secs(duration_secs, sample_count))
    }

    /// Fire-and-forget. Ignored for an empty name, before init and after
    /// terminate.
    pub fn submit(&self, metric: &str, value: i32) {
        let Some(shared) = self.shared.get() else {
            return;
        };
        if metric.is_empty() || shared.terminating.load(Ordering::Relaxed) {
            shared.health.inc_ignored();
            return;
        }
        shared.submit(metric, value);
    }

    /// Stops and joins the worker. Safe to call more than once.
    pub fn terminate(&self) {
        let handle = {
            let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
            if self.terminated.swap(true, Ordering::AcqRel) {
                return;
            }
            worker.take()
        };

        if let Some(shared) = self.shared.get() {
            shared.terminating.store(true, Ordering::Release);
            shared.waker.wake();
        }

        if let Some(handle) = handle {
            info!("terminating engine");
            if handle.join().is_err() {
                error!("aggregation worker panicked");
            } else {
                info!("engine terminated");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.get().is_some() && !self.terminated.load(Ordering::Acquire)
    }

    pub fn config(&self) -> Option<EngineConfig> {
        self.shared.get().map(|s| s.config)
    }

    /// Text report of the retained history, or [`report::NO_DATA`].
    pub fn generate_report(&self) -> String {
        let Some(shared) = self.shared.get() else {
            return report::NO_DATA.to_string();
        };
        match shared.lock_history() {
            Some(history) => report::render_text(&history, shared.config.duration_ms()),
            None => report::NO_DATA.to_string(),
        }
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        let config = self.config().unwrap_or_default();
        let empty = || HistorySnapshot {
            duration_ms: config.duration_ms(),
            sample_count: config.sample_count(),
            dropped_count: 0,
            epochs: Vec::new(),
        };
        let Some(shared) = self.shared.get() else {
            return empty();
        };
        match shared.lock_history() {
            Some(history) => history.snapshot(config.duration_ms()),
            None => empty(),
        }
    }

    pub fn report_json(&self) -> Result<String> {
        report::render_json(&self.snapshot())
    }

    pub fn health(&self) -> HealthSnapshot {
        match self.shared.get() {
            Some(shared) => {
                let dropped = shared.lock_history().map(|h| h.dropped_count()).unwrap_or(0);
                shared.health.snapshot(dropped, shared.queue.len())
            }
            None => EngineHealth::new().snapshot(0, 0),
        }
    }

    /// (p50, p95, p99) of per-epoch summarize time, microseconds.
    pub fn summarize_latency(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        self.shared
            .get()
            .map(|s| s.latency.percentiles())
            .unwrap_or((None, None, None))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.terminate();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    fn shared(engine: &Engine) -> &Shared {
        engine.shared.get().unwrap()
    }

    fn fast(duration_ms: u64, sample_count: usize) -> EngineConfig {
        EngineConfig::new(duration_ms, sample_count).with_poll_interval(Duration::from_millis(2))
    }

    #[test]
    fn uninitialized_engine_reports_no_data() {
        let engine = Engine::new();
        engine.submit("m", 1);
        assert_eq!(engine.generate_report(), report::NO_DATA);
        assert!(!engine.is_running());
        assert!(engine.config().is_none());
    }

    #[test]
    fn fresh_engine_reports_no_data() {
        let engine = Engine::new();
        engine.init_default().unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.generate_report(), report::NO_DATA);
    }

    #[test]
    fn init_is_idempotent() {
        let engine = Engine::start(EngineConfig::new(5_000, 3)).unwrap();
        engine.init(EngineConfig::new(100, 9)).unwrap();
        engine.init_secs(1, 1).unwrap();
        let cfg = engine.config().unwrap();
        assert_eq!(cfg.duration_ms(), 5_000);
        assert_eq!(cfg.sample_count(), 3);
    }

    #[test]
    fn init_after_terminate_fails() {
        let engine = Engine::start(EngineConfig::default()).unwrap();
        engine.terminate();
        assert!(matches!(engine.init_default(), Err(EngineError::Terminated)));
        assert!(!engine.is_running());
    }

    #[test]
    fn terminate_is_idempotent_and_stops_intake() {
        let engine = Engine::start(EngineConfig::default()).unwrap();
        engine.submit("m", 1);
        engine.terminate();
        engine.terminate();
        engine.submit("m", 2);
        let health = engine.health();
        assert_eq!(health.samples_accepted, 1);
        assert_eq!(health.samples_ignored, 1);
    }

    #[test]
    fn empty_metric_name_is_ignored() {
        let engine = Engine::start(EngineConfig::default()).unwrap();
        engine.submit("", 42);
        let s = shared(&engine);
        assert!(s.live.lock().unwrap().windows.is_none());
        s.rotate_now();
        assert!(wait_until(Duration::from_secs(2), || engine.health().epochs_empty == 1));
        assert_eq!(engine.generate_report(), report::NO_DATA);
        assert_eq!(engine.health().samples_ignored, 1);
    }

    #[test]
    fn retired_epoch_is_summarized() {
        let engine = Engine::start(EngineConfig::new(60_000, 4)).unwrap();
        for v in [5, 1, 9, 3, 7, 2, 8, 4, 6, 0] {
            engine.submit("latency", v);
        }
        engine.submit("bytes", 7);
        engine.submit("bytes", 0);
        shared(&engine).rotate_now();

        assert!(wait_until(Duration::from_secs(2), || !engine.snapshot().epochs.is_empty()));
        let snap = engine.snapshot();
        assert_eq!(snap.epochs.len(), 1);
        let latency = snap.epochs[0].get("latency").unwrap();
        assert_eq!((latency.count, latency.sum, latency.avg), (10, 45, 4));
        assert_eq!((latency.min, latency.max), (0, 9));
        assert_eq!((latency.p10, latency.p50, latency.p99), (1, 5, 9));
        let bytes = snap.epochs[0].get("bytes").unwrap();
        assert_eq!((bytes.count, bytes.sum, bytes.avg), (2, 7, 3));

        let text = engine.generate_report();
        assert!(text.contains("metric:latency"));
        assert!(text.contains("metric:bytes"));
        assert!(engine.report_json().unwrap().contains("\"latency\""));
        assert!(engine.summarize_latency().0.is_some());
    }

    #[test]
    fn rotation_seeds_successor_windows() {
        let engine = Engine::start(EngineConfig::default()).unwrap();
        for v in 0..500 {
            engine.submit("busy", v);
        }
        let s = shared(&engine);
        s.rotate_now();
        let live = s.live.lock().unwrap();
        let seeded = live.windows.as_ref().unwrap().get("busy").unwrap();
        assert!(seeded.is_empty());
        assert!(seeded.capacity() >= 600);
    }

    #[test]
    fn idle_engine_still_rotates() {
        let engine = Engine::start(fast(20, 1)).unwrap();
        assert!(wait_until(Duration::from_secs(2), || engine.health().rotations >= 2));
        // Nothing was submitted, so nothing reaches history.
        assert_eq!(engine.generate_report(), report::NO_DATA);
    }

    #[test]
    fn expired_epoch_rotates_without_help() {
        let engine = Engine::start(fast(30, 8)).unwrap();
        engine.submit("m", 11);
        assert!(wait_until(Duration::from_secs(2), || engine.snapshot().total_count("m") == 1));
        let snap = engine.snapshot();
        assert_eq!(snap.epochs.len(), 1);
        assert_eq!(snap.epochs[0].get("m").unwrap().max, 11);
    }

    #[test]
    fn history_stays_bounded() {
        let engine = Engine::start(fast(15, 2)).unwrap();
        for v in 0..6 {
            engine.submit("m", v);
            thread::sleep(Duration::from_millis(25));
        }
        assert!(wait_until(Duration::from_secs(2), || engine.snapshot().dropped_count >= 1));

        let snap = engine.snapshot();
        assert!(snap.epochs.len() <= 2);
        // The worker may evict again between the two reads.
        assert!(engine.health().epochs_dropped >= snap.dropped_count);
        let starts: Vec<i64> = snap.epochs.iter().map(|e| e.start_time).collect();
        assert!(starts.windows(2).all(|w| w[0] <= w[1]), "{starts:?}");
    }

    #[test]
    fn concurrent_submitters_lose_nothing() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 5_000;

        let engine = Engine::start(EngineConfig::new(60_000, 1)).unwrap();
        thread::scope(|scope| {
            for t in 0..THREADS {
                let engine = &engine;
                scope.spawn(move || {
                    for i in 0..PER_THREAD {
                        engine.submit("hits", (t * PER_THREAD + i) as i32);
                    }
                });
            }
        });
        shared(&engine).rotate_now();

        let expected = (THREADS * PER_THREAD) as u64;
        assert!(wait_until(Duration::from_secs(5), || {
            engine.snapshot().total_count("hits") == expected
        }));
        let snap = engine.snapshot();
        let hits = snap.epochs[0].get("hits").unwrap();
        let n = expected as i64;
        assert_eq!(hits.sum, n * (n - 1) / 2);
        assert_eq!((hits.min, hits.max), (0, (n - 1) as i32));
        assert_eq!(engine.health().samples_accepted, expected);
    }

    #[test]
    fn concurrent_submitters_across_rotations() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 20_000;

        let engine = Engine::start(fast(5, 100_000)).unwrap();
        thread::scope(|scope| {
            for _ in 0..THREADS {
                let engine = &engine;
                scope.spawn(move || {
                    for i in 0..PER_THREAD {
                        engine.submit("hits", (i % 100) as i32);
                    }
                });
            }
        });

        let expected = (THREADS * PER_THREAD) as u64;
        assert!(wait_until(Duration::from_secs(5), || {
            engine.snapshot().total_count("hits") == expected
        }));
        assert_eq!(engine.snapshot().dropped_count, 0);
    }
}
