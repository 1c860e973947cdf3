//! Rule resolution
//!
//! Selects the single best-matching rule for an event key and scope. Scope
//! overrides are consulted first: an explicit scope-level disable vetoes
//! everything, and scope-local rules shadow the global rule set entirely
//! when any of them matches.

use std::collections::HashMap;

use crate::condition::ConditionSet;
use crate::matcher::{self, MatchScore};
use crate::rule::{RuleDefaults, RuleDefinition, RuleSet};

/// The outcome of resolving an event key against a rule set.
///
/// Borrowed from the rule set it was resolved against; resolution is a pure
/// read and the view lives only for the one event.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRule<'a> {
    /// The literal pattern that matched, absent for the disabled marker
    pub matched_key: Option<&'a str>,

    /// Whether the rule (or scope) allows dispatch at all
    pub enabled: bool,

    /// Webhook name, merged with defaults
    pub webhook: Option<&'a str>,

    /// Message id, merged with defaults
    pub message: Option<&'a str>,

    /// Permission the actor must hold, if any
    pub permission: Option<&'a str>,

    /// The matched rule's conditions
    pub conditions: Option<&'a ConditionSet>,

    /// Per-event-key rate limit override (events/second)
    pub rate_limit: Option<u32>,
}

impl<'a> ResolvedRule<'a> {
    /// Terminal marker for a scope-level veto
    pub fn disabled() -> Self {
        Self {
            matched_key: None,
            enabled: false,
            webhook: None,
            message: None,
            permission: None,
            conditions: None,
            rate_limit: None,
        }
    }
}

/// Resolves event keys against a [`RuleSet`]
#[derive(Debug, Default)]
pub struct RuleResolver;

impl RuleResolver {
    /// Create a new resolver
    pub fn new() -> Self {
        Self
    }

    /// Resolve the best-matching rule for `event_key` in `scope`.
    ///
    /// Returns `None` when no configured pattern matches; that is not an
    /// error, just silent non-dispatch.
    pub fn resolve<'a>(
        &self,
        rules: &'a RuleSet,
        event_key: &str,
        scope: Option<&str>,
    ) -> Option<ResolvedRule<'a>> {
        let scope_override = scope.and_then(|name| rules.scopes.get(name));

        if let Some(scope_override) = scope_override {
            if scope_override.enabled == Some(false) {
                return Some(ResolvedRule::disabled());
            }
            if let Some(resolved) =
                resolve_from(&scope_override.rules, event_key, &rules.defaults)
            {
                return Some(resolved);
            }
        }

        resolve_from(&rules.rules, event_key, &rules.defaults)
    }
}

fn resolve_from<'a>(
    rules: &'a HashMap<String, RuleDefinition>,
    event_key: &str,
    defaults: &'a RuleDefaults,
) -> Option<ResolvedRule<'a>> {
    let mut best_key: Option<&str> = None;
    let mut best_score = MatchScore::NO_MATCH;
    for pattern in rules.keys() {
        let score = matcher::score(pattern, event_key);
        if score.is_better_than(best_score) {
            best_score = score;
            best_key = Some(pattern);
        }
    }

    let pattern = best_key?;
    let rule = &rules[pattern];
    Some(ResolvedRule {
        matched_key: Some(pattern),
        enabled: rule.enabled.unwrap_or(defaults.enabled),
        webhook: Some(rule.webhook.as_deref().unwrap_or(&defaults.webhook)),
        message: Some(rule.message.as_deref().unwrap_or(&defaults.message)),
        permission: rule
            .require_permission
            .as_deref()
            .or(defaults.require_permission.as_deref()),
        conditions: Some(&rule.conditions),
        rate_limit: rule.rate_limit.map(|spec| spec.events_per_second),
    })
}
