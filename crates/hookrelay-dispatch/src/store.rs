//! Snapshot publication
//!
//! Reload safety comes from immutability: a reload builds a complete new
//! [`ConfigurationSnapshot`] and swaps the shared `Arc`. Resolutions that
//! already cloned the previous `Arc` finish against a fully consistent
//! view; nothing is ever patched in place.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::snapshot::ConfigurationSnapshot;

/// Shared handle to the current configuration generation
pub struct SnapshotStore {
    current: RwLock<Arc<ConfigurationSnapshot>>,
}

impl SnapshotStore {
    /// Create a store with an initial snapshot
    pub fn new(snapshot: ConfigurationSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The current snapshot; the lock is held only for the pointer clone
    pub fn current(&self) -> Arc<ConfigurationSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Publish a new snapshot, replacing the current one
    pub fn install(&self, snapshot: ConfigurationSnapshot) {
        *self.current.write() = Arc::new(snapshot);
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(ConfigurationSnapshot::default())
    }
}
