//! Dispatch outcome counters
//!
//! Counters survive configuration reloads; only an explicit [`StatsTracker::reset`]
//! clears them.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Concurrent counters for dispatch outcomes, global and per event key.
///
/// Cloning shares the underlying counters; increments are atomic and a
/// snapshot read never blocks writers.
#[derive(Clone)]
pub struct StatsTracker {
    inner: Arc<StatsInner>,
}

struct StatsInner {
    sent: AtomicU64,
    dropped: AtomicU64,
    webhook_failures: AtomicU64,
    rate_limited: AtomicU64,
    per_key: RwLock<HashMap<String, Arc<KeyStats>>>,
}

#[derive(Default)]
struct KeyStats {
    sent: AtomicU64,
    dropped: AtomicU64,
    webhook_failures: AtomicU64,
    rate_limited: AtomicU64,
}

impl StatsTracker {
    /// Create a new stats tracker
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StatsInner {
                sent: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                webhook_failures: AtomicU64::new(0),
                rate_limited: AtomicU64::new(0),
                per_key: RwLock::new(HashMap::new()),
            }),
        }
    }

    fn key_stats(&self, event_key: &str) -> Arc<KeyStats> {
        if let Some(stats) = self.inner.per_key.read().get(event_key) {
            return Arc::clone(stats);
        }
        Arc::clone(
            self.inner
                .per_key
                .write()
                .entry(event_key.to_string())
                .or_default(),
        )
    }

    /// Record a successful delivery
    pub fn increment_sent(&self, event_key: &str) {
        self.inner.sent.fetch_add(1, Ordering::Relaxed);
        self.key_stats(event_key).sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event dropped before dispatch
    pub fn increment_dropped(&self, event_key: &str) {
        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        self.key_stats(event_key)
            .dropped
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed delivery attempt
    pub fn increment_webhook_failure(&self, event_key: &str) {
        self.inner.webhook_failures.fetch_add(1, Ordering::Relaxed);
        self.key_stats(event_key)
            .webhook_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rate-limited event
    pub fn increment_rate_limited(&self, event_key: &str) {
        self.inner.rate_limited.fetch_add(1, Ordering::Relaxed);
        self.key_stats(event_key)
            .rate_limited
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Total successful deliveries
    pub fn sent(&self) -> u64 {
        self.inner.sent.load(Ordering::Relaxed)
    }

    /// Total dropped events
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Total failed delivery attempts
    pub fn webhook_failures(&self) -> u64 {
        self.inner.webhook_failures.load(Ordering::Relaxed)
    }

    /// Total rate-limited events
    pub fn rate_limited(&self) -> u64 {
        self.inner.rate_limited.load(Ordering::Relaxed)
    }

    /// Point-in-time snapshot of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let per_key = self
            .inner
            .per_key
            .read()
            .iter()
            .map(|(key, stats)| {
                (
                    key.clone(),
                    KeySnapshot {
                        sent: stats.sent.load(Ordering::Relaxed),
                        dropped: stats.dropped.load(Ordering::Relaxed),
                        webhook_failures: stats.webhook_failures.load(Ordering::Relaxed),
                        rate_limited: stats.rate_limited.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();

        StatsSnapshot {
            sent: self.sent(),
            dropped: self.dropped(),
            webhook_failures: self.webhook_failures(),
            rate_limited: self.rate_limited(),
            per_key,
        }
    }

    /// Clear all counters. Explicit operator action only; reloads never
    /// touch stats.
    pub fn reset(&self) {
        self.inner.sent.store(0, Ordering::Relaxed);
        self.inner.dropped.store(0, Ordering::Relaxed);
        self.inner.webhook_failures.store(0, Ordering::Relaxed);
        self.inner.rate_limited.store(0, Ordering::Relaxed);
        self.inner.per_key.write().clear();
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of all counters at one point in time
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub sent: u64,
    pub dropped: u64,
    pub webhook_failures: u64,
    pub rate_limited: u64,
    pub per_key: HashMap<String, KeySnapshot>,
}

/// Per-event-key counter snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct KeySnapshot {
    pub sent: u64,
    pub dropped: u64,
    pub webhook_failures: u64,
    pub rate_limited: u64,
}
