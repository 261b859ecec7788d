//! Webhook service: use-cases for managing outbound subscriptions.

use std::sync::Arc;

use mims_domain::error::{MimsError, NotFoundError};
use mims_domain::event::{CaseEvent, EventKind};
use mims_domain::id::WebhookId;
use mims_domain::webhook::{DeliveryOutcome, Webhook, generate_secret};

use super::webhook_dispatcher::deliver;
use crate::ports::{WebhookRepository, WebhookSender};

/// Application service for webhook CRUD and test pings.
pub struct WebhookService<W, S> {
    repo: Arc<W>,
    sender: Arc<S>,
}

impl<W, S> WebhookService<W, S>
where
    W: WebhookRepository + Send + Sync,
    S: WebhookSender + Send + Sync,
{
    pub fn new(repo: Arc<W>, sender: Arc<S>) -> Self {
        Self { repo, sender }
    }

    /// Register a webhook.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if invariants fail, or a storage error.
    pub async fn create_webhook(&self, webhook: Webhook) -> Result<Webhook, MimsError> {
        webhook.validate()?;
        let webhook = self.repo.create(webhook).await?;
        tracing::info!(webhook = %webhook.id, url = %webhook.url, "webhook registered");
        Ok(webhook)
    }

    /// Look up a webhook by id.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id, or a storage error.
    pub async fn get_webhook(&self, id: WebhookId) -> Result<Webhook, MimsError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Webhook",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all webhooks.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_webhooks(&self) -> Result<Vec<Webhook>, MimsError> {
        self.repo.get_all().await
    }

    /// Save changes to name, url, events, secret or active flag.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id,
    /// [`MimsError::Validation`] if invariants fail, or a storage error.
    pub async fn update_webhook(&self, webhook: Webhook) -> Result<Webhook, MimsError> {
        self.get_webhook(webhook.id).await?;
        webhook.validate()?;
        self.repo.update(webhook).await
    }

    /// Replace the signing secret with a fresh random one.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id, or a storage error.
    pub async fn rotate_secret(&self, id: WebhookId) -> Result<Webhook, MimsError> {
        let mut webhook = self.get_webhook(id).await?;
        webhook.secret = generate_secret();
        self.repo.update(webhook).await
    }

    /// Delete a webhook.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id, or a storage error.
    pub async fn delete_webhook(&self, id: WebhookId) -> Result<(), MimsError> {
        self.get_webhook(id).await?;
        self.repo.delete(id).await
    }

    /// Send a `webhook.test` event to one webhook, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id, or a storage error.
    /// A failed delivery is reported in the returned outcome.
    pub async fn send_test(&self, id: WebhookId) -> Result<DeliveryOutcome, MimsError> {
        let webhook = self.get_webhook(id).await?;
        let event = CaseEvent::new(
            EventKind::WebhookTest,
            None,
            None,
            serde_json::json!({ "webhook_id": webhook.id, "message": "test delivery" }),
        );
        let outcome = deliver(self.sender.as_ref(), &webhook, &event).await;
        self.repo.record_delivery(&outcome).await?;
        Ok(outcome)
    }
}
