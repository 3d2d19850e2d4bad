//! Level-triggered readiness signal.
//!
//! The ring raises the signal when used capacity reaches the registered
//! threshold and lowers it when a read drops below. The consumer only ever
//! observes it: [`ReadySignal::wait`] blocks on the signal's own mutex, never
//! on the ring's metadata lock.
//!
//! # Protocol
//!
//! **Ring (under its metadata lock):** `set()` / `clear()` to match occupancy.
//!
//! **Consumer:**
//! 1. `wait(timeout)`; on `false`, check for shutdown and wait again
//! 2. `get()` once the signal is set

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Waitable handle to a ring's readiness signal.
///
/// Cloning yields another handle to the same signal.
#[derive(Clone, Debug)]
pub struct ReadySignal {
    inner: Arc<SignalInner>,
}

#[derive(Debug)]
struct SignalInner {
    set: Mutex<bool>,
    cond: Condvar,
}

impl ReadySignal {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                set: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    // The flag is a plain bool, so a panic while holding the lock cannot leave
    // it half-updated.
    fn flag(&self) -> MutexGuard<'_, bool> {
        self.inner.set.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raises the signal and wakes every waiter. No-op if already set.
    pub(crate) fn set(&self) {
        let mut set = self.flag();
        if !*set {
            *set = true;
            self.inner.cond.notify_all();
        }
    }

    pub(crate) fn clear(&self) {
        *self.flag() = false;
    }

    /// Returns whether the signal is currently raised.
    pub fn is_set(&self) -> bool {
        *self.flag()
    }

    /// Blocks until the signal is raised or `timeout` elapses.
    ///
    /// Returns `true` if the signal was set when the wait ended. Returns
    /// immediately if it is already set.
    pub fn wait(&self, timeout: Duration) -> bool {
        let guard = self.flag();
        let (guard, _) = self
            .inner
            .cond
            .wait_timeout_while(guard, timeout, |set| !*set)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}
