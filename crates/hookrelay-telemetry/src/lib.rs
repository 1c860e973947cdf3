//! Hookrelay Telemetry
//!
//! Dispatch statistics and diagnostic deduplication for Hookrelay.
//!
//! Provides:
//! - Lock-free outcome counters, global and per event key
//! - One-shot deduplicated warning emission through `tracing`

pub mod stats;
pub mod warnings;

pub use stats::{KeySnapshot, StatsSnapshot, StatsTracker};
pub use warnings::WarningTracker;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::stats::{StatsSnapshot, StatsTracker};
    pub use crate::warnings::WarningTracker;
}
