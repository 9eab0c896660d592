//! Periodic timer on a std thread, standing in for a host-provided timer.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{io_err, SyncError};
use crate::signal::StopFlag;

/// Calls `tick` every period until it returns `None` or the timer is
/// cancelled. The value `tick` returns is the next period.
pub struct IntervalTimer {
    cancel: Arc<StopFlag>,
    worker: Option<JoinHandle<()>>,
}

impl IntervalTimer {
    pub fn start<F>(period: Duration, mut tick: F) -> Result<Self, SyncError>
    where
        F: FnMut() -> Option<Duration> + Send + 'static,
    {
        let cancel = Arc::new(StopFlag::new());
        let flag = Arc::clone(&cancel);
        let worker = thread::Builder::new()
            .name("skel-timer".to_string())
            .spawn(move || {
                let mut period = period;
                while !flag.wait_timeout(period) {
                    match tick() {
                        Some(next) => period = next,
                        None => break,
                    }
                }
            })
            .map_err(|e| io_err("skel-timer thread", e))?;
        Ok(Self {
            cancel,
            worker: Some(worker),
        })
    }

    pub fn cancel(&self) {
        self.cancel.set();
    }

    pub fn join(mut self) -> Result<(), SyncError> {
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| SyncError::WorkerPanicked("skel-timer")),
            None => Ok(()),
        }
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        self.cancel.set();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn stops_when_callback_returns_none() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let timer = IntervalTimer::start(Duration::from_millis(1), move || {
            let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
            (n < 3).then_some(Duration::from_millis(1))
        })
        .unwrap();
        timer.join().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn cancel_ends_a_long_period() {
        let timer = IntervalTimer::start(Duration::from_secs(3600), || Some(Duration::from_secs(3600)))
            .unwrap();
        timer.cancel();
        timer.join().unwrap();
    }
}
