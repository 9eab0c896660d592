//! Wake signal and stop flag shared between the timer, the sync worker and
//! whoever tears the agent down.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Single-slot coalescing event.
///
/// Raising an already pending signal is a no-op, so a slow sync cycle never
/// builds up a backlog of timer ticks.
#[derive(Debug, Default)]
pub struct WakeSignal {
    pending: Mutex<bool>,
    cv: Condvar,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the signal was not already pending.
    pub fn raise(&self) -> bool {
        let mut pending = self.pending.lock();
        if *pending {
            return false;
        }
        *pending = true;
        self.cv.notify_all();
        true
    }

    pub fn is_pending(&self) -> bool {
        *self.pending.lock()
    }

    pub fn clear(&self) {
        *self.pending.lock() = false;
    }

    /// Block until the signal is pending. Does not clear it.
    pub fn wait(&self) {
        let mut pending = self.pending.lock();
        while !*pending {
            self.cv.wait(&mut pending);
        }
    }
}

/// One-way stop request with a timed wait.
#[derive(Debug, Default)]
pub struct StopFlag {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        let mut stopped = self.stopped.lock();
        *stopped = true;
        self.cv.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.stopped.lock()
    }

    /// Wait up to `timeout` for a stop request. Returns `true` if stopped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.cv.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}
