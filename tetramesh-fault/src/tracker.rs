//! In-flight operation tracking
//!
//! A counting barrier between coordination work (balance rounds, ghost
//! exchanges) and recovery. Recovery pauses admission and waits for the
//! active count to drain to zero before touching partition state:
//!
//! ```text
//! begin() ─→ active += 1          (rejected while paused)
//! token.release() ─→ active -= 1  (idempotent; drop releases too)
//! pause_and_wait(t) ─→ block until active == 0, resume(), or timeout
//! resume() ─→ admission reopens
//! ```

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{FaultError, Result};
use crate::metrics;

struct TrackerShared {
    active: AtomicUsize,
    paused: AtomicBool,
    // Guards the drain wait only; counters are updated lock-free.
    drain_lock: Mutex<()>,
    drained: Condvar,
}

impl TrackerShared {
    fn release_one(&self) {
        let previous = self.active.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "token released with zero active operations");
        if previous == 1 && self.paused.load(Ordering::SeqCst) {
            let _guard = self.drain_lock.lock();
            self.drained.notify_all();
        }
    }
}

/// Tracker for operations that must drain before recovery proceeds
pub struct OperationTracker {
    shared: Arc<TrackerShared>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(TrackerShared {
                active: AtomicUsize::new(0),
                paused: AtomicBool::new(false),
                drain_lock: Mutex::new(()),
                drained: Condvar::new(),
            }),
        }
    }

    /// Admit a new operation
    ///
    /// Fails with [`FaultError::Paused`] while recovery has admission
    /// paused.
    pub fn begin(&self) -> Result<OperationToken> {
        // Increment before checking the flag: a concurrent pause either
        // sees this operation in the count or this thread sees the pause
        // and backs out. Either way no operation slips past a drain.
        self.shared.active.fetch_add(1, Ordering::SeqCst);
        if self.shared.paused.load(Ordering::SeqCst) {
            self.shared.release_one();
            metrics::record_operation_rejected();
            return Err(FaultError::Paused);
        }
        Ok(OperationToken {
            shared: Arc::clone(&self.shared),
            released: AtomicBool::new(false),
        })
    }

    /// Admit a new operation, returning `None` while paused
    pub fn try_begin(&self) -> Option<OperationToken> {
        self.begin().ok()
    }

    /// Pause admission and wait for active operations to drain
    ///
    /// Returns true if the active count reached zero within `timeout` (at
    /// that instant the count was exactly zero), or if `resume` was called
    /// while waiting. Returns false on timeout. Admission stays closed
    /// after a timeout until `resume` is called.
    pub fn pause_and_wait(&self, timeout: Duration) -> bool {
        self.shared.paused.store(true, Ordering::SeqCst);

        let started = Instant::now();
        let deadline = started + timeout;
        let mut guard = self.shared.drain_lock.lock();
        loop {
            if self.shared.active.load(Ordering::SeqCst) == 0 {
                metrics::record_drain_wait(true, started.elapsed());
                return true;
            }
            // A resume while blocked means the drain was abandoned; report
            // success so the caller does not treat it as a timeout.
            if !self.shared.paused.load(Ordering::SeqCst) {
                metrics::record_drain_wait(true, started.elapsed());
                return true;
            }
            if self.shared.drained.wait_until(&mut guard, deadline).timed_out() {
                let drained = self.shared.active.load(Ordering::SeqCst) == 0;
                if !drained {
                    warn!(
                        active = self.shared.active.load(Ordering::SeqCst),
                        "in-flight operations did not drain before timeout"
                    );
                }
                metrics::record_drain_wait(drained, started.elapsed());
                return drained;
            }
        }
    }

    /// Reopen admission and clear barrier state
    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
        let _guard = self.shared.drain_lock.lock();
        self.shared.drained.notify_all();
        debug!("operation admission resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    pub fn active_count(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }
}

impl Default for OperationTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusively owned handle for one admitted operation
///
/// Contributes one to the active count until released. Releasing twice is
/// a no-op; dropping an unreleased token releases it.
pub struct OperationToken {
    shared: Arc<TrackerShared>,
    released: AtomicBool,
}

impl OperationToken {
    /// Mark the operation finished
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.shared.release_one();
        }
    }
}

impl Drop for OperationToken {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_begin_and_release_counts() {
        let tracker = OperationTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let a = tracker.begin().unwrap();
        let b = tracker.begin().unwrap();
        assert_eq!(tracker.active_count(), 2);

        a.release();
        assert_eq!(tracker.active_count(), 1);

        // released token contributes zero to future counts
        a.release();
        assert_eq!(tracker.active_count(), 1);

        drop(b);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn test_begin_fails_while_paused() {
        let tracker = OperationTracker::new();
        assert!(tracker.pause_and_wait(Duration::from_millis(10)));

        assert!(matches!(tracker.begin(), Err(FaultError::Paused)));
        assert!(tracker.try_begin().is_none());
        assert_eq!(tracker.active_count(), 0);

        tracker.resume();
        assert!(!tracker.is_paused());
        let token = tracker.begin().unwrap();
        token.release();
    }

    #[test]
    fn test_pause_with_no_active_returns_immediately() {
        let tracker = OperationTracker::new();
        let started = Instant::now();
        assert!(tracker.pause_and_wait(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn test_pause_times_out_with_active_operation() {
        let tracker = OperationTracker::new();
        let token = tracker.begin().unwrap();

        assert!(!tracker.pause_and_wait(Duration::from_millis(50)));
        assert_eq!(tracker.active_count(), 1);
        // admission stays closed after the timeout
        assert!(tracker.is_paused());
        assert!(tracker.begin().is_err());

        tracker.resume();
        token.release();
    }

    #[test]
    fn test_barrier_drain_cycle() {
        // Two tokens; first pause times out after one release, second
        // pause succeeds once the remaining token is released.
        let tracker = Arc::new(OperationTracker::new());
        let first = tracker.begin().unwrap();
        let second = tracker.begin().unwrap();

        first.release();
        assert!(!tracker.pause_and_wait(Duration::from_millis(100)));
        assert_eq!(tracker.active_count(), 1);
        tracker.resume();

        let tracker_clone = Arc::clone(&tracker);
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            second.release();
        });

        assert!(tracker.pause_and_wait(Duration::from_millis(1000)));
        assert_eq!(tracker_clone.active_count(), 0);
        releaser.join().unwrap();
        tracker.resume();
    }

    #[test]
    fn test_resume_wakes_blocked_pause() {
        let tracker = Arc::new(OperationTracker::new());
        let token = tracker.begin().unwrap();

        let tracker_clone = Arc::clone(&tracker);
        let resumer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tracker_clone.resume();
        });

        // The blocked pause observes the resume and reports true.
        assert!(tracker.pause_and_wait(Duration::from_secs(10)));
        resumer.join().unwrap();

        assert!(!tracker.is_paused());
        token.release();
    }

    #[test]
    fn test_concurrent_begin_release_never_goes_negative() {
        let tracker = Arc::new(OperationTracker::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = Arc::clone(&tracker);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    if let Ok(token) = tracker.begin() {
                        token.release();
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.active_count(), 0);
    }
}
