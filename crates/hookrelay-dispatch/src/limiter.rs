//! Fixed-window rate limiting
//!
//! A counter plus the whole-second timestamp of its current window. This is
//! a tumbling window, not a sliding one: a burst straddling a second
//! boundary can admit up to twice the configured maximum within a
//! sub-second span, which is accepted behavior.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Per-second admission control
pub struct RateLimiter {
    max_per_second: AtomicU32,
    window: Mutex<Window>,
}

struct Window {
    started: u64,
    count: u32,
}

impl RateLimiter {
    /// Create a limiter; the effective maximum is never below 1
    pub fn new(max_per_second: u32) -> Self {
        Self {
            max_per_second: AtomicU32::new(max_per_second.max(1)),
            window: Mutex::new(Window {
                started: 0,
                count: 0,
            }),
        }
    }

    /// Update the maximum without losing the admitted count of the
    /// current window
    pub fn set_limit(&self, max_per_second: u32) {
        self.max_per_second
            .store(max_per_second.max(1), Ordering::Relaxed);
    }

    /// Try to admit one event in the current wall-clock second
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(now_secs())
    }

    fn try_acquire_at(&self, now: u64) -> bool {
        let mut window = self.window.lock();
        if window.started != now {
            window.started = now;
            window.count = 0;
        }
        if window.count >= self.max_per_second.load(Ordering::Relaxed) {
            return false;
        }
        window.count += 1;
        true
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
