//! Webhook dispatcher: signs case events and posts them to subscribers.

use std::error::Error as _;
use std::sync::Arc;

use mims_domain::error::{DeliveryError, MimsError};
use mims_domain::event::CaseEvent;
use mims_domain::webhook::signature::sign;
use mims_domain::webhook::{DeliveryOutcome, Webhook};

use crate::ports::{WebhookRepository, WebhookRequest, WebhookSender};

/// Render a delivery error together with its source chain.
#[must_use]
pub fn describe(err: &DeliveryError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Sign `event` with the webhook secret and send it once.
pub async fn deliver<S>(sender: &S, webhook: &Webhook, event: &CaseEvent) -> DeliveryOutcome
where
    S: WebhookSender + Sync,
{
    let body = match event.to_payload() {
        Ok(body) => body,
        Err(err) => return DeliveryOutcome::failed(webhook.id, None, err.to_string()),
    };
    let request = WebhookRequest {
        url: webhook.url.clone(),
        event: event.kind.to_string(),
        delivery_id: event.id.to_string(),
        signature: sign(&webhook.secret, &body),
        body,
    };

    match sender.send(request).await {
        Ok(status) => DeliveryOutcome::succeeded(webhook.id, status),
        Err(err) => {
            tracing::warn!(webhook = %webhook.id, event = %event.kind, error = %describe(&err), "webhook delivery failed");
            DeliveryOutcome::failed(webhook.id, err.status(), describe(&err))
        }
    }
}

/// Fans events out to every subscribed webhook and records the outcomes.
pub struct WebhookDispatcher<W, S> {
    webhooks: Arc<W>,
    sender: Arc<S>,
}

impl<W, S> WebhookDispatcher<W, S>
where
    W: WebhookRepository + Send + Sync,
    S: WebhookSender + Send + Sync,
{
    pub fn new(webhooks: Arc<W>, sender: Arc<S>) -> Self {
        Self { webhooks, sender }
    }

    /// Deliver `event` to each active subscriber, one attempt each.
    ///
    /// # Errors
    ///
    /// Returns a storage error when subscribers cannot be loaded or an
    /// outcome cannot be recorded. Delivery failures are reported in the
    /// returned outcomes instead.
    pub async fn dispatch(&self, event: &CaseEvent) -> Result<Vec<DeliveryOutcome>, MimsError> {
        let subscribers = self.webhooks.find_subscribed(event.kind).await?;
        let mut outcomes = Vec::with_capacity(subscribers.len());
        for webhook in &subscribers {
            let outcome = deliver(self.sender.as_ref(), webhook, event).await;
            self.webhooks.record_delivery(&outcome).await?;
            outcomes.push(outcome);
        }
        if !outcomes.is_empty() {
            tracing::debug!(event = %event.kind, deliveries = outcomes.len(), "webhooks dispatched");
        }
        Ok(outcomes)
    }
}
