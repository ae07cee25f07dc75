//! One-shot match deadline.
//!
//! A [`MatchTimer`] is created disarmed, armed once with a duration and an
//! expiry callback, and disarmed either by natural expiry (the callback
//! fires exactly once) or by an explicit [`MatchTimer::cancel`]. Firing is
//! asynchronous with respect to the coordinator loop, which only observes
//! the resulting stop flag at its poll points, so the effective timeout
//! granularity is one poll iteration.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

struct Armed {
    cancel_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// An armed/disarmed one-shot deadline.
pub struct MatchTimer {
    armed: Option<Armed>,
    fired: Arc<AtomicBool>,
}

impl Default for MatchTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchTimer {
    /// A disarmed timer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            armed: None,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Arm the deadline. Re-arming a live timer cancels the previous
    /// deadline first.
    ///
    /// The callback runs on the timer thread; it is expected to do nothing
    /// more than flip a stop flag.
    pub fn arm<F>(&mut self, duration: Duration, on_expiry: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.fired.store(false, Ordering::Release);
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let fired = Arc::clone(&self.fired);
        let handle = std::thread::spawn(move || {
            // A message or a hangup both mean "cancelled".
            if cancel_rx.recv_timeout(duration) == Err(RecvTimeoutError::Timeout) {
                fired.store(true, Ordering::Release);
                on_expiry();
            }
        });
        self.armed = Some(Armed { cancel_tx, handle });
    }

    /// Disarm if not yet fired. Idempotent; safe to call after expiry.
    pub fn cancel(&mut self) {
        if let Some(armed) = self.armed.take() {
            // Ignore a send to a timer that already fired and exited.
            let _ = armed.cancel_tx.send(());
            let _ = armed.handle.join();
        }
    }

    /// Whether the deadline expired (and the callback ran).
    #[must_use]
    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl Drop for MatchTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for MatchTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchTimer")
            .field("armed", &self.armed.is_some())
            .field("fired", &self.fired())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_fires_once_after_duration() {
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        let mut timer = MatchTimer::new();
        timer.arm(Duration::from_millis(5), move || {
            seen.fetch_add(1, Ordering::AcqRel);
        });
        std::thread::sleep(Duration::from_millis(50));
        assert!(timer.fired());
        assert_eq!(count.load(Ordering::Acquire), 1);
        // Cancelling after expiry is safe.
        timer.cancel();
        assert_eq!(count.load(Ordering::Acquire), 1);
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        let mut timer = MatchTimer::new();
        timer.arm(Duration::from_millis(200), move || {
            seen.fetch_add(1, Ordering::AcqRel);
        });
        timer.cancel();
        std::thread::sleep(Duration::from_millis(20));
        assert!(!timer.fired());
        assert_eq!(count.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut timer = MatchTimer::new();
        timer.cancel();
        timer.arm(Duration::from_millis(100), || {});
        timer.cancel();
        timer.cancel();
        assert!(!timer.fired());
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let count = Arc::new(AtomicU32::new(0));
        let first = Arc::clone(&count);
        let mut timer = MatchTimer::new();
        timer.arm(Duration::from_millis(500), move || {
            first.fetch_add(100, Ordering::AcqRel);
        });
        let second = Arc::clone(&count);
        timer.arm(Duration::from_millis(5), move || {
            second.fetch_add(1, Ordering::AcqRel);
        });
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::Acquire), 1);
    }
}
