//! Rule definitions and the rule set aggregate

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

use crate::condition::ConditionSet;
use crate::matcher;

/// Process-wide fallback values applied wherever a rule leaves a field unset
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RuleDefaults {
    /// Whether rules fire unless they say otherwise
    pub enabled: bool,

    /// Webhook name used when a rule names none
    pub webhook: String,

    /// Display username for dispatched messages, if any
    pub webhook_username: Option<String>,

    /// Message id used when a rule names none
    pub message: String,

    /// Permission the actor must hold, if any
    pub require_permission: Option<String>,
}

impl Default for RuleDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook: "default".to_string(),
            webhook_username: None,
            message: "generic".to_string(),
            require_permission: None,
        }
    }
}

/// Per-rule rate limit override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RateLimitSpec {
    /// Maximum admitted events per second for the matched key
    pub events_per_second: u32,
}

/// A configured rule, keyed by a dot-segmented pattern.
///
/// Every field is optional; unset fields defer to [`RuleDefaults`] at
/// resolution time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RuleDefinition {
    /// Override for the enabled flag
    pub enabled: Option<bool>,

    /// Override for the webhook name
    pub webhook: Option<String>,

    /// Override for the message id
    pub message: Option<String>,

    /// Override for the required permission
    pub require_permission: Option<String>,

    /// Conditions that must all pass for the rule to fire
    pub conditions: ConditionSet,

    /// Per-event-key rate limit override
    pub rate_limit: Option<RateLimitSpec>,
}

/// Scope-level rule overrides (e.g. one world's configuration).
///
/// An explicit `enabled: false` vetoes every rule for the scope; the scope's
/// own rules otherwise take precedence over the global rule set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ScopeOverride {
    /// Optional veto for the whole scope
    pub enabled: Option<bool>,

    /// Scope-local pattern → rule mapping
    #[serde(rename = "events")]
    pub rules: HashMap<String, RuleDefinition>,
}

/// The complete rule configuration: defaults, global rules, scope overrides
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RuleSet {
    /// Fallback values for unset rule fields
    pub defaults: RuleDefaults,

    /// Global pattern → rule mapping
    #[serde(rename = "events")]
    pub rules: HashMap<String, RuleDefinition>,

    /// Scope name → override mapping
    pub scopes: HashMap<String, ScopeOverride>,
}

impl RuleSet {
    /// Create an empty rule set with the given defaults
    pub fn new(defaults: RuleDefaults) -> Self {
        Self {
            defaults,
            rules: HashMap::new(),
            scopes: HashMap::new(),
        }
    }

    /// Load a rule set from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Add a global rule under the given pattern; empty patterns are ignored
    pub fn insert_rule(&mut self, pattern: impl Into<String>, rule: RuleDefinition) {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return;
        }
        self.rules.insert(pattern, rule);
    }

    /// Add a scope override; empty scope names are ignored
    pub fn insert_scope(&mut self, name: impl Into<String>, scope: ScopeOverride) {
        let name = name.into();
        if name.is_empty() {
            return;
        }
        self.scopes.insert(name, scope);
    }

    /// All configured patterns, global and scoped
    pub fn configured_keys(&self) -> BTreeSet<&str> {
        let mut keys: BTreeSet<&str> = self.rules.keys().map(String::as_str).collect();
        for scope in self.scopes.values() {
            keys.extend(scope.rules.keys().map(String::as_str));
        }
        keys
    }

    /// Configured patterns that match none of the host's known event keys.
    ///
    /// Used by configuration validation to surface rules that can never
    /// fire (typos, keys the host no longer emits).
    pub fn unresolvable_patterns<'a>(
        &self,
        known_keys: impl IntoIterator<Item = &'a str>,
    ) -> Vec<String> {
        let known: Vec<&str> = known_keys.into_iter().collect();
        self.configured_keys()
            .into_iter()
            .filter(|pattern| !known.iter().any(|key| matcher::matches(pattern, key)))
            .map(String::from)
            .collect()
    }
}
