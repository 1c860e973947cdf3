//! Event context types for Hookrelay

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A single field value attached to an event context.
///
/// Values keep their source type but compare and render through their
/// string form; numeric comparison coerces through [`FieldValue::as_f64`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean value
    Bool(bool),

    /// Integer value
    Int(i64),

    /// Floating point value
    Float(f64),

    /// String value
    Str(String),
}

impl FieldValue {
    /// Numeric coercion used by comparison operators.
    ///
    /// Numbers convert directly; strings are parsed. Anything that cannot
    /// be read as a number coerces to `0.0` rather than erroring.
    pub fn as_f64(&self) -> f64 {
        match self {
            FieldValue::Int(v) => *v as f64,
            FieldValue::Float(v) => *v,
            FieldValue::Str(s) => s.trim().parse().unwrap_or(0.0),
            FieldValue::Bool(_) => 0.0,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Identity of whoever caused an event, with a permission-check capability.
///
/// The host runtime supplies the implementation; the pipeline only ever
/// asks for the display name and whether a permission node is held.
pub trait Actor: Send + Sync {
    /// Display name of the actor
    fn name(&self) -> &str;

    /// Whether the actor holds the given permission
    fn has_permission(&self, permission: &str) -> bool;
}

/// A single event occurrence handed to the pipeline.
///
/// Created fresh per occurrence by the event source. The key classifies the
/// event (`player.break.block`); fields carry the values templates and
/// conditions read. The context always carries its own key under the
/// `event.name` field.
#[derive(Clone)]
pub struct EventContext {
    key: String,
    fields: HashMap<String, FieldValue>,
    actor: Option<Arc<dyn Actor>>,
    scope: Option<String>,
}

impl EventContext {
    /// Create a context for the given event key
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let mut fields = HashMap::new();
        fields.insert("event.name".to_string(), FieldValue::Str(key.clone()));
        Self {
            key,
            fields,
            actor: None,
            scope: None,
        }
    }

    /// Add a field value (builder form)
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Attach the acting identity (builder form)
    pub fn with_actor(mut self, actor: Arc<dyn Actor>) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Attach the scope name, e.g. a world (builder form)
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Add a field value during context building
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        if name.is_empty() {
            return;
        }
        self.fields.insert(name, value.into());
    }

    /// The event key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// All field values
    pub fn fields(&self) -> &HashMap<String, FieldValue> {
        &self.fields
    }

    /// A single field value, if present
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// The acting identity, if any
    pub fn actor(&self) -> Option<&Arc<dyn Actor>> {
        self.actor.as_ref()
    }

    /// The scope name, if any
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl fmt::Debug for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .field("fields", &self.fields)
            .field("actor", &self.actor.as_ref().map(|a| a.name().to_string()))
            .finish()
    }
}
