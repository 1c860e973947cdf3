//! The per-event pipeline
//!
//! Resolution → enablement → permission → conditions → rate limit →
//! template → webhook target → dispatch. Every early exit either is
//! silent (no matching rule, disabled rule) or increments the matching
//! stat; nothing past this boundary ever propagates an error to the event
//! source.

use hookrelay_core::EventContext;
use hookrelay_rules::RuleResolver;
use hookrelay_telemetry::{StatsTracker, WarningTracker};
use std::sync::Arc;
use tracing::debug;

use crate::dispatcher::Dispatcher;
use crate::redaction::RedactionPolicy;
use crate::store::SnapshotStore;
use crate::template::TemplateResolver;

/// Routes incoming events through the rule pipeline to the dispatcher
pub struct EventRouter {
    store: Arc<SnapshotStore>,
    dispatcher: Arc<Dispatcher>,
    stats: StatsTracker,
    warnings: WarningTracker,
    resolver: RuleResolver,
    templates: TemplateResolver,
}

impl EventRouter {
    /// Create a router reading configuration from `store`
    pub fn new(
        store: Arc<SnapshotStore>,
        dispatcher: Arc<Dispatcher>,
        stats: StatsTracker,
        warnings: WarningTracker,
    ) -> Self {
        Self {
            store,
            dispatcher,
            stats,
            warnings,
            resolver: RuleResolver::new(),
            templates: TemplateResolver::new(),
        }
    }

    /// Handle one event occurrence
    pub async fn handle_event(&self, ctx: &EventContext) {
        self.process(ctx, None, false).await;
    }

    /// Handle one event, pushing a line per pipeline step into `trace`.
    ///
    /// Under `dry_run` the pipeline runs all gates (including the rate
    /// limiter) but stops short of the actual send. Administrative
    /// surfaces build their "fire" previews on this.
    pub async fn handle_event_traced(
        &self,
        ctx: &EventContext,
        trace: &mut Vec<String>,
        dry_run: bool,
    ) {
        self.process(ctx, Some(trace), dry_run).await;
    }

    async fn process(&self, ctx: &EventContext, mut trace: Option<&mut Vec<String>>, dry_run: bool) {
        let snapshot = self.store.current();
        debug!(event_key = %ctx.key(), scope = ?ctx.scope(), "handling event");

        if let Some(trace) = trace.as_deref_mut() {
            trace.push(match ctx.scope() {
                Some(scope) => format!("fire: event_key={} scope={}", ctx.key(), scope),
                None => format!("fire: event_key={}", ctx.key()),
            });
        }

        let Some(resolved) = self.resolver.resolve(&snapshot.rules, ctx.key(), ctx.scope())
        else {
            if let Some(trace) = trace.as_deref_mut() {
                trace.push(format!("no rule matched for {}", ctx.key()));
            }
            return;
        };
        let matched_key = resolved.matched_key.unwrap_or(ctx.key());

        if let Some(trace) = trace.as_deref_mut() {
            trace.push(format!(
                "rule matched: {} (webhook={} message={})",
                matched_key,
                resolved.webhook.unwrap_or("-"),
                resolved.message.unwrap_or("-"),
            ));
        }

        if !resolved.enabled {
            if let Some(trace) = trace.as_deref_mut() {
                trace.push("rule is disabled; event not dispatched".to_string());
            }
            return;
        }

        if let Some(permission) = resolved.permission.filter(|p| !p.is_empty()) {
            let allowed = ctx
                .actor()
                .map_or(false, |actor| actor.has_permission(permission));
            if !allowed {
                if let Some(trace) = trace.as_deref_mut() {
                    trace.push(format!(
                        "permission check failed: {} (actor={})",
                        permission,
                        ctx.actor().map(|actor| actor.name()).unwrap_or("none"),
                    ));
                }
                self.stats.increment_dropped(ctx.key());
                return;
            }
        }

        if let Some(conditions) = resolved.conditions {
            if !conditions.evaluate(ctx.fields()) {
                if let Some(trace) = trace.as_deref_mut() {
                    trace.push("conditions did not match; event not dispatched".to_string());
                }
                self.stats.increment_dropped(ctx.key());
                return;
            }
        }

        if !self
            .dispatcher
            .allow_dispatch(&snapshot.dispatch, ctx.key(), resolved.rate_limit)
        {
            if let Some(trace) = trace.as_deref_mut() {
                trace.push("rate limited; event not dispatched".to_string());
            }
            self.stats.increment_rate_limited(ctx.key());
            return;
        }

        let message_id = resolved.message.unwrap_or_default();
        let Some(template) = snapshot.messages.template(message_id) else {
            if let Some(trace) = trace.as_deref_mut() {
                trace.push(format!("missing message template: {message_id}"));
            }
            self.warnings.warn_once(
                format!("missing-message:{matched_key}"),
                format!("missing message template for {matched_key}: {message_id}"),
            );
            self.stats.increment_dropped(ctx.key());
            return;
        };

        let redaction = RedactionPolicy::from_settings(&snapshot.redaction);
        let content = self.templates.resolve(
            Some(template),
            ctx.fields(),
            &redaction,
            &self.warnings,
            snapshot.dispatch.validate_placeholders,
        );
        if let Some(trace) = trace.as_deref_mut() {
            trace.push(format!("message rendered (template={message_id})"));
        }

        let webhook_name = resolved.webhook.unwrap_or_default();
        let target = snapshot
            .webhook(webhook_name)
            .filter(|target| !target.url.is_empty());
        let Some(target) = target else {
            if let Some(trace) = trace.as_deref_mut() {
                trace.push(format!("missing webhook: {webhook_name}"));
            }
            self.warnings.warn_once(
                format!("missing-webhook:{matched_key}"),
                format!("missing webhook target for {matched_key}: {webhook_name}"),
            );
            self.stats.increment_dropped(ctx.key());
            return;
        };

        let username = snapshot
            .messages
            .username(message_id)
            .map(str::to_string)
            .or_else(|| snapshot.rules.defaults.webhook_username.clone());

        if dry_run {
            if let Some(trace) = trace.as_deref_mut() {
                trace.push(format!(
                    "dry run: would dispatch to webhook {webhook_name} (not sent)"
                ));
            }
            return;
        }

        self.dispatcher
            .dispatch(&snapshot.dispatch, ctx.key(), target, content, username)
            .await;
        debug!(event_key = %ctx.key(), webhook = %webhook_name, "event dispatched");
        if let Some(trace) = trace.as_deref_mut() {
            trace.push(format!("dispatched to webhook {webhook_name}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{
        ConfigurationSnapshot, DispatchSettings, RedactionSettings, WebhookTarget,
    };
    use crate::testutil::one_shot_server;
    use hookrelay_core::Actor;
    use hookrelay_rules::rule::{RateLimitSpec, RuleDefinition, RuleSet, ScopeOverride};

    struct TestActor {
        permissions: Vec<&'static str>,
    }

    impl Actor for TestActor {
        fn name(&self) -> &str {
            "Steve"
        }

        fn has_permission(&self, permission: &str) -> bool {
            self.permissions.contains(&permission)
        }
    }

    fn join_rule() -> RuleDefinition {
        RuleDefinition {
            webhook: Some("default".to_string()),
            message: Some("join_msg".to_string()),
            ..Default::default()
        }
    }

    fn base_snapshot(url: &str, rule: RuleDefinition) -> ConfigurationSnapshot {
        let mut rules = RuleSet::default();
        rules.insert_rule("player.join", rule);
        ConfigurationSnapshot::builder()
            .rules(rules)
            .webhook("default", WebhookTarget::new(url))
            .message("join_msg", "{player.name} joined")
            .dispatch(DispatchSettings {
                dispatch_async: false,
                ..Default::default()
            })
            .build()
    }

    fn router_with(
        snapshot: ConfigurationSnapshot,
    ) -> (EventRouter, StatsTracker, WarningTracker) {
        let stats = StatsTracker::new();
        let warnings = WarningTracker::new();
        let dispatcher = Arc::new(Dispatcher::new(stats.clone(), warnings.clone()));
        let store = Arc::new(SnapshotStore::new(snapshot));
        (
            EventRouter::new(store, dispatcher, stats.clone(), warnings.clone()),
            stats,
            warnings,
        )
    }

    /// URL that refuses connections; a dispatch against it shows up as a
    /// webhook failure, so "nothing was sent" is observable in stats.
    async fn refused_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        drop(listener);
        url
    }

    #[tokio::test]
    async fn test_end_to_end_dispatch() {
        let (url, body) = one_shot_server(200).await;
        let (router, stats, _) = router_with(base_snapshot(&url, join_rule()));

        let ctx = EventContext::new("player.join").with_field("player.name", "Steve");
        router.handle_event(&ctx).await;

        assert_eq!(body.await.unwrap(), r#"{"content":"Steve joined"}"#);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.sent, 1);
        assert_eq!(snapshot.per_key["player.join"].sent, 1);
    }

    #[tokio::test]
    async fn test_no_rule_is_silent() {
        let url = refused_url().await;
        let (router, stats, _) = router_with(base_snapshot(&url, join_rule()));

        router
            .handle_event(&EventContext::new("entity.damage"))
            .await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.sent, 0);
        assert_eq!(snapshot.dropped, 0);
        assert_eq!(snapshot.webhook_failures, 0);
        assert_eq!(snapshot.rate_limited, 0);
    }

    #[tokio::test]
    async fn test_disabled_rule_is_silent() {
        let url = refused_url().await;
        let rule = RuleDefinition {
            enabled: Some(false),
            ..join_rule()
        };
        let (router, stats, _) = router_with(base_snapshot(&url, rule));

        router.handle_event(&EventContext::new("player.join")).await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.dropped, 0);
        assert_eq!(snapshot.webhook_failures, 0);
    }

    #[tokio::test]
    async fn test_scope_veto_is_silent() {
        let url = refused_url().await;
        let mut snapshot = base_snapshot(&url, join_rule());
        snapshot.rules.insert_scope(
            "world_nether",
            ScopeOverride {
                enabled: Some(false),
                ..Default::default()
            },
        );
        let (router, stats, _) = router_with(snapshot);

        let ctx = EventContext::new("player.join").with_scope("world_nether");
        router.handle_event(&ctx).await;

        assert_eq!(stats.snapshot().webhook_failures, 0);
        assert_eq!(stats.snapshot().dropped, 0);
    }

    #[tokio::test]
    async fn test_permission_denied_drops() {
        let url = refused_url().await;
        let rule = RuleDefinition {
            require_permission: Some("hooks.join".to_string()),
            ..join_rule()
        };
        let (router, stats, _) = router_with(base_snapshot(&url, rule));

        // No actor at all.
        router.handle_event(&EventContext::new("player.join")).await;
        // Actor without the permission.
        let ctx = EventContext::new("player.join").with_actor(Arc::new(TestActor {
            permissions: vec![],
        }));
        router.handle_event(&ctx).await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.dropped, 2);
        assert_eq!(snapshot.webhook_failures, 0);
    }

    #[tokio::test]
    async fn test_permission_granted_dispatches() {
        let (url, body) = one_shot_server(200).await;
        let rule = RuleDefinition {
            require_permission: Some("hooks.join".to_string()),
            ..join_rule()
        };
        let (router, stats, _) = router_with(base_snapshot(&url, rule));

        let ctx = EventContext::new("player.join")
            .with_field("player.name", "Steve")
            .with_actor(Arc::new(TestActor {
                permissions: vec!["hooks.join"],
            }));
        router.handle_event(&ctx).await;

        assert_eq!(body.await.unwrap(), r#"{"content":"Steve joined"}"#);
        assert_eq!(stats.sent(), 1);
    }

    #[tokio::test]
    async fn test_condition_mismatch_drops() {
        let url = refused_url().await;
        let mut rules = RuleSet::default();
        let rule_yaml = r#"
webhook: default
message: join_msg
conditions:
  block.type:
    equals:
      - DIAMOND_ORE
"#;
        let rule: RuleDefinition = serde_yaml::from_str(rule_yaml).unwrap();
        rules.insert_rule("player.join", rule);
        let mut snapshot = base_snapshot(&url, join_rule());
        snapshot.rules = rules;
        let (router, stats, _) = router_with(snapshot);

        let ctx = EventContext::new("player.join").with_field("block.type", "STONE");
        router.handle_event(&ctx).await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.dropped, 1);
        assert_eq!(snapshot.webhook_failures, 0);
    }

    #[tokio::test]
    async fn test_missing_template_warns_and_drops() {
        let url = refused_url().await;
        let rule = RuleDefinition {
            message: Some("no_such_template".to_string()),
            ..join_rule()
        };
        let (router, stats, warnings) = router_with(base_snapshot(&url, rule));

        router.handle_event(&EventContext::new("player.join")).await;
        router.handle_event(&EventContext::new("player.join")).await;

        assert_eq!(stats.dropped(), 2);
        assert!(warnings.has_warned("missing-message:player.join"));
    }

    #[tokio::test]
    async fn test_missing_webhook_warns_and_drops() {
        let url = refused_url().await;
        let rule = RuleDefinition {
            webhook: Some("ghost".to_string()),
            ..join_rule()
        };
        let (router, stats, warnings) = router_with(base_snapshot(&url, rule));

        router.handle_event(&EventContext::new("player.join")).await;

        assert_eq!(stats.dropped(), 1);
        assert!(warnings.has_warned("missing-webhook:player.join"));
    }

    #[tokio::test]
    async fn test_empty_webhook_url_counts_as_missing() {
        let snapshot = base_snapshot("", join_rule());
        let (router, stats, warnings) = router_with(snapshot);

        router.handle_event(&EventContext::new("player.join")).await;

        assert_eq!(stats.dropped(), 1);
        assert!(warnings.has_warned("missing-webhook:player.join"));
    }

    #[tokio::test]
    async fn test_rate_limited_increments_stat() {
        let url = refused_url().await;
        let rule = RuleDefinition {
            rate_limit: Some(RateLimitSpec {
                events_per_second: 1,
            }),
            ..join_rule()
        };
        let (router, stats, _) = router_with(base_snapshot(&url, rule));

        // Dry runs still consume the rate limit but never dispatch; three
        // quick calls span at most two windows so at least one is limited.
        let mut trace = Vec::new();
        for _ in 0..3 {
            router
                .handle_event_traced(&EventContext::new("player.join"), &mut trace, true)
                .await;
        }

        assert!(stats.rate_limited() >= 1);
        assert_eq!(stats.sent(), 0);
        assert_eq!(stats.webhook_failures(), 0);
    }

    #[tokio::test]
    async fn test_redaction_applies_to_rendered_content() {
        let (url, body) = one_shot_server(200).await;
        let mut snapshot = base_snapshot(&url, join_rule());
        snapshot.redaction = RedactionSettings {
            enabled: true,
            fields: vec!["player.*".to_string()],
        };
        let (router, _, _) = router_with(snapshot);

        let ctx = EventContext::new("player.join").with_field("player.name", "Steve");
        router.handle_event(&ctx).await;

        assert_eq!(body.await.unwrap(), r#"{"content":"[REDACTED] joined"}"#);
    }

    #[tokio::test]
    async fn test_per_message_username_wins_over_defaults() {
        let (url, body) = one_shot_server(200).await;
        let mut snapshot = base_snapshot(&url, join_rule());
        snapshot.messages.insert_with_username("join_msg", "{player.name} joined", "Watchdog");
        snapshot.rules.defaults.webhook_username = Some("DefaultName".to_string());
        let (router, _, _) = router_with(snapshot);

        let ctx = EventContext::new("player.join").with_field("player.name", "Steve");
        router.handle_event(&ctx).await;

        assert_eq!(
            body.await.unwrap(),
            r#"{"content":"Steve joined","username":"Watchdog"}"#
        );
    }

    #[tokio::test]
    async fn test_default_username_used_when_message_has_none() {
        let (url, body) = one_shot_server(200).await;
        let mut snapshot = base_snapshot(&url, join_rule());
        snapshot.rules.defaults.webhook_username = Some("DefaultName".to_string());
        let (router, _, _) = router_with(snapshot);

        let ctx = EventContext::new("player.join").with_field("player.name", "Steve");
        router.handle_event(&ctx).await;

        assert_eq!(
            body.await.unwrap(),
            r#"{"content":"Steve joined","username":"DefaultName"}"#
        );
    }

    #[tokio::test]
    async fn test_trace_reports_pipeline_steps() {
        let url = refused_url().await;
        let (router, _, _) = router_with(base_snapshot(&url, join_rule()));

        let mut trace = Vec::new();
        let ctx = EventContext::new("player.join").with_field("player.name", "Steve");
        router.handle_event_traced(&ctx, &mut trace, true).await;

        assert!(trace.iter().any(|line| line.contains("rule matched: player.join")));
        assert!(trace.iter().any(|line| line.contains("dry run")));
    }

    #[tokio::test]
    async fn test_trace_reports_no_match() {
        let url = refused_url().await;
        let (router, _, _) = router_with(base_snapshot(&url, join_rule()));

        let mut trace = Vec::new();
        router
            .handle_event_traced(&EventContext::new("entity.damage"), &mut trace, false)
            .await;

        assert!(trace.iter().any(|line| line.contains("no rule matched")));
    }
}
