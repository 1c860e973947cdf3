//! Deduplicated one-shot warnings

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Emits each distinct warning at most once per process.
///
/// Configuration problems (missing templates, unresolvable patterns,
/// rate-limit latches) tend to recur on every event; deduplication keys
/// keep them from flooding the log. Cloning shares the dedupe set.
#[derive(Clone, Default)]
pub struct WarningTracker {
    inner: Arc<WarningInner>,
}

#[derive(Default)]
struct WarningInner {
    emitted: RwLock<HashSet<String>>,
}

impl WarningTracker {
    /// Create a new warning tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `message` unless a warning with this dedupe key was already
    /// emitted. Returns whether the warning was emitted.
    pub fn warn_once(&self, dedupe_key: impl Into<String>, message: impl AsRef<str>) -> bool {
        let dedupe_key = dedupe_key.into();
        if self.inner.emitted.read().contains(&dedupe_key) {
            return false;
        }
        if !self.inner.emitted.write().insert(dedupe_key) {
            return false;
        }
        warn!("{}", message.as_ref());
        true
    }

    /// Whether a warning with this dedupe key was already emitted
    pub fn has_warned(&self, dedupe_key: &str) -> bool {
        self.inner.emitted.read().contains(dedupe_key)
    }

    /// Clear the dedupe set; the host may call this on reload
    pub fn reset(&self) {
        self.inner.emitted.write().clear();
    }
}
