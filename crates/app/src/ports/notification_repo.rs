//! Notification ports: webhooks, LINE channels, templates and the outbox.

use std::future::Future;

use mims_domain::error::MimsError;
use mims_domain::event::EventKind;
use mims_domain::id::{LineChannelId, NotificationId, TemplateId, WebhookId};
use mims_domain::line_channel::LineChannel;
use mims_domain::notification::{Notification, NotificationStatus};
use mims_domain::template::NotificationTemplate;
use mims_domain::webhook::{DeliveryOutcome, Webhook};

/// Repository for [`Webhook`] subscriptions.
pub trait WebhookRepository {
    fn create(&self, webhook: Webhook) -> impl Future<Output = Result<Webhook, MimsError>> + Send;

    fn get_by_id(
        &self,
        id: WebhookId,
    ) -> impl Future<Output = Result<Option<Webhook>, MimsError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<Webhook>, MimsError>> + Send;

    /// Active webhooks subscribed to `kind`.
    fn find_subscribed(
        &self,
        kind: EventKind,
    ) -> impl Future<Output = Result<Vec<Webhook>, MimsError>> + Send;

    fn update(&self, webhook: Webhook) -> impl Future<Output = Result<Webhook, MimsError>> + Send;

    /// Fold a delivery outcome into the stored counters.
    fn record_delivery(
        &self,
        outcome: &DeliveryOutcome,
    ) -> impl Future<Output = Result<(), MimsError>> + Send;

    fn delete(&self, id: WebhookId) -> impl Future<Output = Result<(), MimsError>> + Send;
}

/// Repository for [`LineChannel`] credentials.
pub trait LineChannelRepository {
    fn create(
        &self,
        channel: LineChannel,
    ) -> impl Future<Output = Result<LineChannel, MimsError>> + Send;

    fn get_by_id(
        &self,
        id: LineChannelId,
    ) -> impl Future<Output = Result<Option<LineChannel>, MimsError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<LineChannel>, MimsError>> + Send;

    fn update(
        &self,
        channel: LineChannel,
    ) -> impl Future<Output = Result<LineChannel, MimsError>> + Send;

    fn delete(&self, id: LineChannelId) -> impl Future<Output = Result<(), MimsError>> + Send;
}

/// Repository for [`NotificationTemplate`]s.
pub trait TemplateRepository {
    fn create(
        &self,
        template: NotificationTemplate,
    ) -> impl Future<Output = Result<NotificationTemplate, MimsError>> + Send;

    fn get_by_id(
        &self,
        id: TemplateId,
    ) -> impl Future<Output = Result<Option<NotificationTemplate>, MimsError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<NotificationTemplate>, MimsError>> + Send;

    /// Active templates bound to `kind`.
    fn find_active_for_event(
        &self,
        kind: EventKind,
    ) -> impl Future<Output = Result<Vec<NotificationTemplate>, MimsError>> + Send;

    /// Whether any template sends through the channel.
    fn uses_channel(
        &self,
        channel_id: LineChannelId,
    ) -> impl Future<Output = Result<bool, MimsError>> + Send;

    fn update(
        &self,
        template: NotificationTemplate,
    ) -> impl Future<Output = Result<NotificationTemplate, MimsError>> + Send;

    fn delete(&self, id: TemplateId) -> impl Future<Output = Result<(), MimsError>> + Send;
}

/// The notification outbox.
pub trait NotificationRepository {
    fn enqueue(
        &self,
        notification: Notification,
    ) -> impl Future<Output = Result<Notification, MimsError>> + Send;

    fn get_by_id(
        &self,
        id: NotificationId,
    ) -> impl Future<Output = Result<Option<Notification>, MimsError>> + Send;

    /// Newest first, optionally filtered by status.
    fn list(
        &self,
        status: Option<NotificationStatus>,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Notification>, MimsError>> + Send;

    /// Oldest pending rows first.
    fn pending(&self, limit: u32)
    -> impl Future<Output = Result<Vec<Notification>, MimsError>> + Send;

    /// Persist status, attempts, error and sent time of a row.
    fn save_outcome(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<(), MimsError>> + Send;
}
