//! Webhook dispatch
//!
//! Serializes rendered content to the outbound JSON payload and performs
//! the HTTP POST, optionally without blocking the caller. Delivery is
//! at-most-once and best-effort: failures are counted and optionally
//! logged, never retried. The dispatcher also owns the rate-limit gate:
//! one global limiter, lazily-cached per-event-key limiters for rules with
//! an override, and the latched disabled-event set for the `disable-event`
//! overflow behavior.

use hookrelay_telemetry::{StatsTracker, WarningTracker};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::limiter::RateLimiter;
use crate::snapshot::{DispatchSettings, OverflowBehavior, WebhookTarget};

/// Outbound webhook payload.
///
/// Serialization handles JSON string escaping; `username` is omitted
/// entirely when absent.
#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    /// Rendered message content
    pub content: String,

    /// Display username, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl WebhookPayload {
    /// Serialize to the outbound JSON body
    pub fn to_json(&self) -> hookrelay_core::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Sends rendered events to webhook targets, recording outcomes
pub struct Dispatcher {
    client: reqwest::Client,
    stats: StatsTracker,
    warnings: WarningTracker,
    global_limiter: RateLimiter,
    event_limiters: RwLock<HashMap<String, Arc<RateLimiter>>>,
    disabled_events: RwLock<HashSet<String>>,
}

impl Dispatcher {
    /// Create a dispatcher recording outcomes into `stats`
    pub fn new(stats: StatsTracker, warnings: WarningTracker) -> Self {
        Self {
            client: reqwest::Client::new(),
            stats,
            warnings,
            global_limiter: RateLimiter::new(100),
            event_limiters: RwLock::new(HashMap::new()),
            disabled_events: RwLock::new(HashSet::new()),
        }
    }

    /// Rate-limit gate for one event.
    ///
    /// A per-rule override replaces the global limiter for that event key.
    /// Rejection under the `disable-event` overflow behavior latches the
    /// key until [`Dispatcher::reset`].
    pub fn allow_dispatch(
        &self,
        settings: &DispatchSettings,
        event_key: &str,
        rate_limit_override: Option<u32>,
    ) -> bool {
        if !settings.rate_limit_enabled {
            return true;
        }
        if self.disabled_events.read().contains(event_key) {
            return false;
        }

        self.global_limiter
            .set_limit(settings.rate_limit_events_per_second);

        let admitted = match rate_limit_override.filter(|limit| *limit > 0) {
            Some(limit) => {
                let limiter = self.event_limiter(event_key, limit);
                limiter.set_limit(limit);
                limiter.try_acquire()
            }
            None => self.global_limiter.try_acquire(),
        };
        if admitted {
            return true;
        }

        if settings.rate_limit_overflow == OverflowBehavior::DisableEvent {
            self.disabled_events.write().insert(event_key.to_string());
            self.warnings.warn_once(
                format!("rate-limit-disabled:{event_key}"),
                format!("rate limit exceeded, disabling event until reload: {event_key}"),
            );
        }
        false
    }

    fn event_limiter(&self, event_key: &str, limit: u32) -> Arc<RateLimiter> {
        if let Some(limiter) = self.event_limiters.read().get(event_key) {
            return Arc::clone(limiter);
        }
        Arc::clone(
            self.event_limiters
                .write()
                .entry(event_key.to_string())
                .or_insert_with(|| Arc::new(RateLimiter::new(limit))),
        )
    }

    /// Send `content` to `target`.
    ///
    /// With async dispatch configured the send is spawned onto the runtime
    /// and this call returns immediately; otherwise the send is awaited.
    /// The caller-supplied username falls back to the target's configured
    /// one; empty usernames are treated as absent.
    pub async fn dispatch(
        &self,
        settings: &DispatchSettings,
        event_key: &str,
        target: &WebhookTarget,
        content: String,
        username: Option<String>,
    ) {
        let username = username
            .filter(|name| !name.is_empty())
            .or_else(|| target.username.clone())
            .filter(|name| !name.is_empty());
        let payload = WebhookPayload { content, username };

        let send = send_webhook(
            self.client.clone(),
            target.url.clone(),
            target.timeout_ms,
            event_key.to_string(),
            payload,
            self.stats.clone(),
            settings.log_webhook_failures,
        );
        if settings.dispatch_async {
            tokio::spawn(send);
        } else {
            send.await;
        }
    }

    /// Clear the latched disabled-event set and the per-key limiter cache.
    /// Invoked whenever configuration reloads.
    pub fn reset(&self) {
        self.disabled_events.write().clear();
        self.event_limiters.write().clear();
    }
}

async fn send_webhook(
    client: reqwest::Client,
    url: String,
    timeout_ms: u64,
    event_key: String,
    payload: WebhookPayload,
    stats: StatsTracker,
    log_failures: bool,
) {
    let body = match payload.to_json() {
        Ok(body) => body,
        Err(err) => {
            stats.increment_webhook_failure(&event_key);
            if log_failures {
                warn!(
                    event_key = %event_key,
                    error = %err,
                    "webhook payload serialization failed"
                );
            }
            return;
        }
    };

    let result = client
        .post(&url)
        .timeout(Duration::from_millis(timeout_ms))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            stats.increment_sent(&event_key);
        }
        Ok(response) => {
            stats.increment_webhook_failure(&event_key);
            if log_failures {
                warn!(
                    event_key = %event_key,
                    status = %response.status(),
                    "webhook delivery failed"
                );
            }
        }
        Err(err) => {
            stats.increment_webhook_failure(&event_key);
            if log_failures {
                warn!(
                    event_key = %event_key,
                    error = %err,
                    "webhook request failed"
                );
            }
        }
    }
}
