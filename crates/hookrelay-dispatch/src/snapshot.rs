//! Configuration snapshot model
//!
//! A [`ConfigurationSnapshot`] is an immutable aggregate of everything a
//! single event resolution needs: the rule set, webhook targets, message
//! templates, and dispatch/redaction settings. Reloads build a brand-new
//! snapshot; a snapshot handed to an in-flight resolution is never mutated.

use hookrelay_core::Error;
use hookrelay_rules::RuleSet;
use hookrelay_telemetry::WarningTracker;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// Default per-request webhook timeout in milliseconds
fn default_timeout_ms() -> u64 {
    5000
}

/// Definition of a webhook endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WebhookTarget {
    /// Endpoint URL for the JSON POST
    pub url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Display username sent with the payload when the message carries none
    #[serde(default)]
    pub username: Option<String>,
}

impl WebhookTarget {
    /// Create a target for the given URL with the default timeout
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: default_timeout_ms(),
            username: None,
        }
    }

    /// Set the per-request timeout (builder form)
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the display username (builder form)
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// A message template plus its optional per-message display username
#[derive(Debug, Clone)]
pub struct MessageEntry {
    /// Template text with `{placeholder}` tokens
    pub content: String,

    /// Display username override for this message
    pub username: Option<String>,
}

impl<'de> Deserialize<'de> for MessageEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawEntry {
            Content(String),
            Full {
                content: String,
                #[serde(default)]
                username: Option<String>,
            },
        }

        Ok(match RawEntry::deserialize(deserializer)? {
            RawEntry::Content(content) => MessageEntry {
                content,
                username: None,
            },
            RawEntry::Full { content, username } => MessageEntry { content, username },
        })
    }
}

/// Message-id → template mapping
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct MessageCatalog {
    messages: HashMap<String, MessageEntry>,
}

impl MessageCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template under the given id; empty ids are ignored
    pub fn insert(&mut self, id: impl Into<String>, content: impl Into<String>) {
        let id = id.into();
        if id.is_empty() {
            return;
        }
        self.messages.insert(
            id,
            MessageEntry {
                content: content.into(),
                username: None,
            },
        );
    }

    /// Add a template with a per-message display username
    pub fn insert_with_username(
        &mut self,
        id: impl Into<String>,
        content: impl Into<String>,
        username: impl Into<String>,
    ) {
        let id = id.into();
        if id.is_empty() {
            return;
        }
        self.messages.insert(
            id,
            MessageEntry {
                content: content.into(),
                username: Some(username.into()),
            },
        );
    }

    /// Whether a template exists for the id
    pub fn has_message(&self, id: &str) -> bool {
        self.messages.contains_key(id)
    }

    /// The template for the id, if any
    pub fn template(&self, id: &str) -> Option<&str> {
        self.messages.get(id).map(|entry| entry.content.as_str())
    }

    /// The per-message display username for the id, if any
    pub fn username(&self, id: &str) -> Option<&str> {
        self.messages
            .get(id)
            .and_then(|entry| entry.username.as_deref())
    }
}

/// Behavior when the rate limit rejects an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowBehavior {
    /// Reject only the single over-limit event
    #[default]
    Drop,

    /// Latch the event key into a permanently-rejecting set until reload
    DisableEvent,
}

/// Rate-limit and delivery settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DispatchSettings {
    /// Whether rate limiting applies at all
    pub rate_limit_enabled: bool,

    /// Global admitted events per second
    pub rate_limit_events_per_second: u32,

    /// What to do with over-limit events
    pub rate_limit_overflow: OverflowBehavior,

    /// Deliver without blocking the caller
    pub dispatch_async: bool,

    /// Log failed delivery attempts
    pub log_webhook_failures: bool,

    /// Warn (once) about placeholders with no field value
    pub validate_placeholders: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            rate_limit_enabled: true,
            rate_limit_events_per_second: 100,
            rate_limit_overflow: OverflowBehavior::Drop,
            dispatch_async: true,
            log_webhook_failures: true,
            validate_placeholders: true,
        }
    }
}

/// Field redaction settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RedactionSettings {
    /// Whether redaction applies at all
    pub enabled: bool,

    /// Field-name patterns to mask, with wildcard-and-prefix semantics
    pub fields: Vec<String>,
}

impl Default for RedactionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            fields: Vec::new(),
        }
    }
}

/// Immutable aggregate of one configuration generation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConfigurationSnapshot {
    /// Rule defaults, global rules, and scope overrides
    pub rules: RuleSet,

    /// Webhook-name → target mapping
    pub webhooks: HashMap<String, WebhookTarget>,

    /// Message-id → template mapping
    pub messages: MessageCatalog,

    /// Rate-limit and delivery settings
    pub dispatch: DispatchSettings,

    /// Field redaction settings
    pub redaction: RedactionSettings,
}

impl ConfigurationSnapshot {
    /// Start building a snapshot
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Load a snapshot from YAML
    pub fn from_yaml(yaml: &str) -> hookrelay_core::Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|err| Error::config(format!("invalid configuration: {err}")))
    }

    /// The target for a webhook name, if configured
    pub fn webhook(&self, name: &str) -> Option<&WebhookTarget> {
        self.webhooks.get(name)
    }

    /// Warn (once each) about configuration entries that can never take
    /// effect: a missing or empty `default` webhook, rules referencing
    /// unknown message ids or webhook names, and — when the host supplies
    /// its known event keys — patterns that resolve no key at all.
    pub fn validate(&self, known_event_keys: &[&str], warnings: &WarningTracker) {
        if self
            .webhook("default")
            .map_or(true, |target| target.url.is_empty())
        {
            warnings.warn_once(
                "missing-default-webhook",
                "default webhook is missing or has an empty url",
            );
        }

        let scoped_rules = self
            .rules
            .scopes
            .values()
            .flat_map(|scope| scope.rules.iter());
        for (pattern, rule) in self.rules.rules.iter().chain(scoped_rules) {
            let message_id = rule
                .message
                .as_deref()
                .unwrap_or(&self.rules.defaults.message);
            if !self.messages.has_message(message_id) {
                warnings.warn_once(
                    format!("missing-message-config:{pattern}"),
                    format!("rule {pattern} references unknown message {message_id}"),
                );
            }

            let webhook_name = rule
                .webhook
                .as_deref()
                .unwrap_or(&self.rules.defaults.webhook);
            if self.webhook(webhook_name).is_none() {
                warnings.warn_once(
                    format!("missing-webhook-config:{pattern}"),
                    format!("rule {pattern} references unknown webhook {webhook_name}"),
                );
            }
        }

        if !known_event_keys.is_empty() {
            for pattern in self
                .rules
                .unresolvable_patterns(known_event_keys.iter().copied())
            {
                warnings.warn_once(
                    format!("unresolvable-pattern:{pattern}"),
                    format!("rule pattern {pattern} matches no known event key"),
                );
            }
        }
    }
}

/// Builder for [`ConfigurationSnapshot`]
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: ConfigurationSnapshot,
}

impl SnapshotBuilder {
    /// Set the rule set
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.snapshot.rules = rules;
        self
    }

    /// Add a webhook target
    pub fn webhook(mut self, name: impl Into<String>, target: WebhookTarget) -> Self {
        self.snapshot.webhooks.insert(name.into(), target);
        self
    }

    /// Add a message template
    pub fn message(mut self, id: impl Into<String>, content: impl Into<String>) -> Self {
        self.snapshot.messages.insert(id, content);
        self
    }

    /// Add a message template with a per-message display username
    pub fn message_with_username(
        mut self,
        id: impl Into<String>,
        content: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        self.snapshot.messages.insert_with_username(id, content, username);
        self
    }

    /// Set the dispatch settings
    pub fn dispatch(mut self, settings: DispatchSettings) -> Self {
        self.snapshot.dispatch = settings;
        self
    }

    /// Set the redaction settings
    pub fn redaction(mut self, settings: RedactionSettings) -> Self {
        self.snapshot.redaction = settings;
        self
    }

    /// Finish building
    pub fn build(self) -> ConfigurationSnapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let snapshot = ConfigurationSnapshot::builder()
            .webhook("default", WebhookTarget::new("https://example.com/hook"))
            .message("generic", "{event.name} fired")
            .message_with_username("alert", "{event.name}!", "Watchdog")
            .build();

        assert!(snapshot.webhook("default").is_some());
        assert!(snapshot.webhook("missing").is_none());
        assert_eq!(snapshot.messages.template("generic"), Some("{event.name} fired"));
        assert_eq!(snapshot.messages.username("alert"), Some("Watchdog"));
    }

    #[test]
    fn test_catalog_username_lookup() {
        let mut catalog = MessageCatalog::new();
        catalog.insert("plain", "hello");
        catalog.insert_with_username("fancy", "hello", "Herald");

        assert_eq!(catalog.username("plain"), None);
        assert_eq!(catalog.username("fancy"), Some("Herald"));
        assert!(!catalog.has_message("missing"));
    }

    #[test]
    fn test_catalog_ignores_empty_id() {
        let mut catalog = MessageCatalog::new();
        catalog.insert("", "hello");
        assert!(!catalog.has_message(""));
    }

    #[test]
    fn test_validate_warns_about_dangling_references() {
        let mut rules = RuleSet::default();
        rules.insert_rule(
            "player.join",
            hookrelay_rules::RuleDefinition {
                message: Some("no_such_message".to_string()),
                webhook: Some("no_such_webhook".to_string()),
                ..Default::default()
            },
        );
        rules.insert_rule("plaer.quit", hookrelay_rules::RuleDefinition::default());
        let snapshot = ConfigurationSnapshot::builder()
            .rules(rules)
            .message("generic", "{event.name}")
            .build();

        let warnings = WarningTracker::new();
        snapshot.validate(&["player.join", "player.quit"], &warnings);

        assert!(warnings.has_warned("missing-default-webhook"));
        assert!(warnings.has_warned("missing-message-config:player.join"));
        assert!(warnings.has_warned("missing-webhook-config:player.join"));
        assert!(warnings.has_warned("unresolvable-pattern:plaer.quit"));
    }

    #[test]
    fn test_validate_clean_configuration_stays_quiet() {
        let mut rules = RuleSet::default();
        rules.insert_rule("player.join", hookrelay_rules::RuleDefinition::default());
        let snapshot = ConfigurationSnapshot::builder()
            .rules(rules)
            .webhook("default", WebhookTarget::new("https://example.com/hook"))
            .message("generic", "{event.name}")
            .build();

        let warnings = WarningTracker::new();
        snapshot.validate(&["player.join"], &warnings);

        assert!(!warnings.has_warned("missing-default-webhook"));
        assert!(!warnings.has_warned("missing-message-config:player.join"));
        assert!(!warnings.has_warned("unresolvable-pattern:player.join"));
    }

    #[test]
    fn test_from_yaml_rejects_malformed_input() {
        let err = ConfigurationSnapshot::from_yaml("webhooks: [not, a, map]").unwrap_err();
        assert!(err.to_string().contains("configuration error"));
    }

    #[test]
    fn test_decode_from_yaml() {
        let yaml = r#"
rules:
  events:
    player.join:
      message: player_join
webhooks:
  default:
    url: https://example.com/hook
    timeout-ms: 2500
    username: Herald
messages:
  player_join: "{player.name} joined"
  server_start:
    content: "server up"
    username: Watchdog
dispatch:
  rate-limit-events-per-second: 10
  rate-limit-overflow: disable-event
redaction:
  fields:
    - player.ip
"#;
        let snapshot = ConfigurationSnapshot::from_yaml(yaml).unwrap();
        assert_eq!(snapshot.webhooks["default"].timeout_ms, 2500);
        assert_eq!(snapshot.webhooks["default"].username.as_deref(), Some("Herald"));
        assert_eq!(
            snapshot.messages.template("player_join"),
            Some("{player.name} joined")
        );
        assert_eq!(snapshot.messages.username("server_start"), Some("Watchdog"));
        assert_eq!(snapshot.dispatch.rate_limit_events_per_second, 10);
        assert_eq!(
            snapshot.dispatch.rate_limit_overflow,
            OverflowBehavior::DisableEvent
        );
        // Unset settings keep their defaults.
        assert!(snapshot.dispatch.rate_limit_enabled);
        assert!(snapshot.dispatch.dispatch_async);
        assert_eq!(snapshot.redaction.fields, vec!["player.ip".to_string()]);
    }
}
