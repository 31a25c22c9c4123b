//! Clock implementations.

use std::sync::atomic::{AtomicI64, Ordering};

use turnstile_core::ports::Clock;

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Settable clock for tests and replaying recorded traffic.
///
/// Moving it backwards is rejected so the non-decreasing contract holds.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Jump to `now`. Returns `false` and leaves the clock alone if `now`
    /// is earlier than the current reading.
    pub fn set(&self, now: i64) -> bool {
        self.now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (now >= current).then_some(now)
            })
            .is_ok()
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds.max(0), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
