//! Hand-off of retired window sets from submitters to the worker.
//!
//! The queue has its own lock, separate from the submission lock, so a
//! draining worker never stalls submitters for longer than a `Vec` swap.
//! The wake signal is a capacity-1 channel: repeated signals before the
//! worker looks collapse into one, and signalling never blocks.

use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{error, trace};

use crate::window::WindowSet;

pub struct RotationQueue {
    pending: Mutex<Vec<WindowSet>>,
}

impl RotationQueue {
    pub fn new() -> Self {
        Self { pending: Mutex::new(Vec::new()) }
    }

    /// Takes ownership of a retired set. Returns false (set dropped) only if
    /// the queue lock is poisoned.
    pub fn push(&self, set: WindowSet) -> bool {
        match self.pending.lock() {
            Ok(mut pending) => {
                pending.push(set);
                true
            }
            Err(_) => {
                error!(
                    start_time = set.start_time(),
                    samples = set.sample_count(),
                    "rotation queue lock poisoned, retired epoch dropped"
                );
                false
            }
        }
    }

    /// Swaps the pending list out in one step. Retirement order is kept.
    pub fn drain(&self) -> Vec<WindowSet> {
        match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => {
                error!("rotation queue lock poisoned, nothing drained");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RotationQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Wake signal
// ---------------------------------------------------------------------------

/// Sending half, held by the shared engine state.
#[derive(Clone)]
pub struct Waker {
    tx: Sender<()>,
}

/// Receiving half, owned by the worker thread.
pub struct WakeReceiver {
    rx: Receiver<()>,
}

/// Outcome of one bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Signalled,
    TimedOut,
    /// Every sender is gone; the worker should stop.
    Closed,
}

pub fn wake_channel() -> (Waker, WakeReceiver) {
    let (tx, rx) = bounded(1);
    (Waker { tx }, WakeReceiver { rx })
}

impl Waker {
    /// Never blocks. A full slot means a wake is already pending; a
    /// disconnected receiver means the worker has exited.
    pub fn wake(&self) {
        if let Err(TrySendError::Disconnected(())) = self.tx.try_send(()) {
            trace!("wake signal dropped, worker gone");
        }
    }
}

impl WakeReceiver {
    pub fn wait(&self, timeout: Duration) -> Wake {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => Wake::Signalled,
            Err(RecvTimeoutError::Timeout) => Wake::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Wake::Closed,
        }
    }
}
