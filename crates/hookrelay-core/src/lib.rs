//! Hookrelay Core
//!
//! Core types shared across Hookrelay components.
//!
//! This crate provides:
//! - The per-occurrence event context and field value model
//! - The actor permission-check capability
//! - Error types and result handling

pub mod context;
pub mod error;

pub use context::{Actor, EventContext, FieldValue};
pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{Actor, EventContext, FieldValue};
    pub use crate::error::{Error, Result};
}
