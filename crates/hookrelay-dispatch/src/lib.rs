//! Hookrelay Dispatch
//!
//! Everything downstream of rule resolution: configuration snapshots and
//! their atomic publication, field redaction, message templating, rate
//! limiting, asynchronous webhook delivery, and the per-event pipeline
//! that ties the stages together.
//!
//! Delivery is at-most-once and best-effort. Failures are counted and
//! optionally logged, never retried, and nothing in the pipeline
//! propagates an error back to the event source.

pub mod dispatcher;
pub mod limiter;
pub mod redaction;
pub mod router;
pub mod snapshot;
pub mod store;
pub mod template;

#[cfg(test)]
pub(crate) mod testutil;

pub use dispatcher::{Dispatcher, WebhookPayload};
pub use limiter::RateLimiter;
pub use redaction::RedactionPolicy;
pub use router::EventRouter;
pub use snapshot::{
    ConfigurationSnapshot, DispatchSettings, MessageCatalog, OverflowBehavior,
    RedactionSettings, SnapshotBuilder, WebhookTarget,
};
pub use store::SnapshotStore;
pub use template::TemplateResolver;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::dispatcher::Dispatcher;
    pub use crate::router::EventRouter;
    pub use crate::snapshot::{ConfigurationSnapshot, DispatchSettings, WebhookTarget};
    pub use crate::store::SnapshotStore;
    pub use crate::template::TemplateResolver;
}
