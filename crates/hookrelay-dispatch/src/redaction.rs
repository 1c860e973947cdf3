//! Field redaction policy

use hookrelay_rules::matcher;

use crate::snapshot::RedactionSettings;

/// Decides which field names must be masked in rendered content.
///
/// Patterns use the same wildcard-and-prefix segment semantics as event key
/// matching: `player.*` redacts `player.name` and `player.uuid` alike.
#[derive(Debug, Clone, Copy)]
pub struct RedactionPolicy<'a> {
    enabled: bool,
    patterns: &'a [String],
}

impl<'a> RedactionPolicy<'a> {
    /// Create a policy from an explicit pattern list
    pub fn new(enabled: bool, patterns: &'a [String]) -> Self {
        Self { enabled, patterns }
    }

    /// Policy view over snapshot settings
    pub fn from_settings(settings: &'a RedactionSettings) -> Self {
        Self::new(settings.enabled, &settings.fields)
    }

    /// A policy that never redacts
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            patterns: &[],
        }
    }

    /// Whether redaction applies at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the field's rendered value must be masked
    pub fn is_redacted(&self, field: &str) -> bool {
        self.enabled
            && self
                .patterns
                .iter()
                .any(|pattern| matcher::matches(pattern, field))
    }
}
