//! Cancellation handle shared between a page activation and its background threads.
//!
//! One `CancelToken` is created per activation and never reused. Every
//! suspension point of a synchronizer waits through [`CancelToken::wait_timeout`]
//! so a deactivation wakes it immediately instead of after the full interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

struct CancelInner {
    /// Fast-path flag, readable without taking the lock
    cancelled: AtomicBool,
    /// Lock + condvar pair used to wake sleeping waiters
    wake: (Mutex<bool>, Condvar),
}

/// Clones observe the same signal.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken").field("cancelled", &self.is_cancelled()).finish()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                wake: (Mutex::new(false), Condvar::new()),
            }),
        }
    }

    /// Signal cancellation. Calling it again is a no-op.
    /// Returns true only for the call that actually flipped the signal.
    pub fn cancel(&self) -> bool {
        let (lock, cvar) = &self.inner.wake;
        let mut flag = lock.lock().unwrap_or_else(|e| e.into_inner());
        if *flag {
            return false;
        }
        *flag = true;
        self.inner.cancelled.store(true, Ordering::SeqCst);
        cvar.notify_all();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `timeout` or until cancelled, whichever comes first.
    /// Returns true if the token was cancelled (the caller should return).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &self.inner.wake;
        let mut flag = lock.lock().unwrap_or_else(|e| e.into_inner());
        while !*flag {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            // Spurious wakeups loop back and re-check against the deadline
            let (guard, _) = cvar.wait_timeout(flag, deadline - now).unwrap_or_else(|e| e.into_inner());
            flag = guard;
        }
        true
    }
}
