//! Webhook: an outbound HTTP subscription to case events.

pub mod signature;

use serde::{Deserialize, Serialize};

use crate::error::{MimsError, ValidationError};
use crate::event::EventKind;
use crate::id::WebhookId;
use crate::time::{Timestamp, now};
use crate::validate::max_chars;

/// Shortest accepted signing secret.
pub const MIN_SECRET_CHARS: usize = 16;

/// Longest stored error message for the last failed delivery.
const MAX_ERROR_CHARS: usize = 500;

/// An endpoint that receives signed case events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: WebhookId,
    pub name: String,
    pub url: String,
    /// HMAC signing secret. Never serialized.
    #[serde(skip_serializing, default)]
    pub secret: String,
    pub events: Vec<EventKind>,
    pub active: bool,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_status: Option<u16>,
    pub last_error: Option<String>,
    pub last_delivered_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// Generate a random signing secret.
#[must_use]
pub fn generate_secret() -> String {
    format!(
        "whsec_{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub webhook_id: WebhookId,
    pub success: bool,
    /// HTTP status, when the remote answered.
    pub status: Option<u16>,
    pub error: Option<String>,
    pub delivered_at: Timestamp,
}

impl DeliveryOutcome {
    #[must_use]
    pub fn succeeded(webhook_id: WebhookId, status: u16) -> Self {
        Self {
            webhook_id,
            success: true,
            status: Some(status),
            error: None,
            delivered_at: now(),
        }
    }

    #[must_use]
    pub fn failed(webhook_id: WebhookId, status: Option<u16>, error: impl Into<String>) -> Self {
        let mut error: String = error.into();
        if let Some((idx, _)) = error.char_indices().nth(MAX_ERROR_CHARS) {
            error.truncate(idx);
        }
        Self {
            webhook_id,
            success: false,
            status,
            error: Some(error),
            delivered_at: now(),
        }
    }
}

impl Webhook {
    #[must_use]
    pub fn builder() -> WebhookBuilder {
        WebhookBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for a blank name, a non-HTTP url, a short
    /// secret or an empty event list.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        max_chars("name", &self.name, 100)?;
        max_chars("url", &self.url, 2_000)?;
        let lower = self.url.to_ascii_lowercase();
        let rest = lower
            .strip_prefix("https://")
            .or_else(|| lower.strip_prefix("http://"));
        if rest.is_none_or(|host| host.is_empty() || host.starts_with('/')) {
            return Err(ValidationError::InvalidUrl);
        }
        if self.secret.chars().count() < MIN_SECRET_CHARS {
            return Err(ValidationError::SecretTooShort {
                min: MIN_SECRET_CHARS,
            });
        }
        if self.events.is_empty() {
            return Err(ValidationError::NoEvents);
        }
        Ok(())
    }

    /// Whether this webhook should receive `kind`.
    ///
    /// Test pings are delivered to any active webhook.
    #[must_use]
    pub fn subscribes_to(&self, kind: EventKind) -> bool {
        self.active && (kind == EventKind::WebhookTest || self.events.contains(&kind))
    }

    /// Fold a delivery outcome into the counters.
    pub fn record(&mut self, outcome: &DeliveryOutcome) {
        if outcome.success {
            self.success_count += 1;
            self.last_error = None;
        } else {
            self.failure_count += 1;
            self.last_error.clone_from(&outcome.error);
        }
        self.last_status = outcome.status;
        self.last_delivered_at = Some(outcome.delivered_at);
    }
}

#[derive(Debug, Default)]
pub struct WebhookBuilder {
    id: Option<WebhookId>,
    name: Option<String>,
    url: Option<String>,
    secret: Option<String>,
    events: Vec<EventKind>,
    active: Option<bool>,
}

impl WebhookBuilder {
    #[must_use]
    pub fn id(mut self, id: WebhookId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Signing secret. A random one is generated when omitted.
    #[must_use]
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn event(mut self, kind: EventKind) -> Self {
        if !self.events.contains(&kind) {
            self.events.push(kind);
        }
        self
    }

    #[must_use]
    pub fn events(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        for kind in kinds {
            self = self.event(kind);
        }
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Consume the builder, validate, and return a [`Webhook`].
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if invariants fail.
    pub fn build(self) -> Result<Webhook, MimsError> {
        let webhook = Webhook {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default().trim().to_string(),
            url: self.url.unwrap_or_default().trim().to_string(),
            secret: self.secret.unwrap_or_else(generate_secret),
            events: self.events,
            active: self.active.unwrap_or(true),
            success_count: 0,
            failure_count: 0,
            last_status: None,
            last_error: None,
            last_delivered_at: None,
            created_at: now(),
        };
        webhook.validate()?;
        Ok(webhook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook() -> Webhook {
        Webhook::builder()
            .name("ERP")
            .url("https://erp.example.com/hooks/mims")
            .event(EventKind::CaseCreated)
            .event(EventKind::CaseStatusChanged)
            .build()
            .unwrap()
    }

    #[test]
    fn should_generate_secret_when_missing() {
        let hook = webhook();
        assert!(hook.secret.starts_with("whsec_"));
        assert!(hook.secret.len() >= MIN_SECRET_CHARS);
    }

    #[test]
    fn should_deduplicate_events() {
        let hook = Webhook::builder()
            .name("x")
            .url("http://localhost:9000/hook")
            .events([EventKind::CaseCreated, EventKind::CaseCreated])
            .build()
            .unwrap();
        assert_eq!(hook.events, vec![EventKind::CaseCreated]);
    }

    #[test]
    fn should_reject_non_http_url() {
        for url in ["ftp://example.com", "example.com", "https://", "http:///path"] {
            let result = Webhook::builder()
                .name("x")
                .url(url)
                .event(EventKind::CaseCreated)
                .build();
            assert!(
                matches!(result, Err(MimsError::Validation(ValidationError::InvalidUrl))),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn should_reject_short_secret() {
        let result = Webhook::builder()
            .name("x")
            .url("https://example.com")
            .secret("short")
            .event(EventKind::CaseCreated)
            .build();
        assert!(matches!(
            result,
            Err(MimsError::Validation(ValidationError::SecretTooShort { .. }))
        ));
    }

    #[test]
    fn should_reject_empty_event_list() {
        let result = Webhook::builder().name("x").url("https://example.com").build();
        assert!(matches!(
            result,
            Err(MimsError::Validation(ValidationError::NoEvents))
        ));
    }

    #[test]
    fn should_subscribe_only_to_selected_events_when_active() {
        let mut hook = webhook();
        assert!(hook.subscribes_to(EventKind::CaseCreated));
        assert!(!hook.subscribes_to(EventKind::CaseDeleted));
        assert!(hook.subscribes_to(EventKind::WebhookTest));

        hook.active = false;
        assert!(!hook.subscribes_to(EventKind::CaseCreated));
    }

    #[test]
    fn should_count_successes_and_failures() {
        let mut hook = webhook();
        hook.record(&DeliveryOutcome::failed(hook.id, Some(500), "boom"));
        assert_eq!(hook.failure_count, 1);
        assert_eq!(hook.last_error.as_deref(), Some("boom"));

        hook.record(&DeliveryOutcome::succeeded(hook.id, 204));
        assert_eq!(hook.success_count, 1);
        assert_eq!(hook.last_status, Some(204));
        assert!(hook.last_error.is_none());
    }

    #[test]
    fn should_truncate_long_error_messages() {
        let outcome = DeliveryOutcome::failed(WebhookId::new(), None, "x".repeat(2_000));
        assert_eq!(outcome.error.unwrap().len(), MAX_ERROR_CHARS);
    }

    #[test]
    fn should_not_serialize_secret() {
        let json = serde_json::to_string(&webhook()).unwrap();
        assert!(!json.contains("whsec_"));
    }
}
