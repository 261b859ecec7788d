//! Notification service: the LINE outbox.
//!
//! Case events are rendered through the active templates into pending rows;
//! [`NotificationService::process_outbox`] pushes them in a single pass.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use mims_domain::case::Case;
use mims_domain::error::{MimsError, NotFoundError, ValidationError};
use mims_domain::event::CaseEvent;
use mims_domain::id::{CaseId, LineChannelId, NotificationId};
use mims_domain::line_channel::LineChannel;
use mims_domain::notification::{Notification, NotificationStatus};
use mims_domain::template::{CaseNames, case_context};

use super::webhook_dispatcher::describe;
use crate::ports::{LineChannelRepository, LineMessenger, NotificationRepository, TemplateRepository};

/// Counters for one outbox pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutboxReport {
    pub processed: usize,
    pub sent: usize,
    /// Rows whose attempt failed in this pass, whether or not they will be retried.
    pub failed: usize,
}

fn event_context(event: &CaseEvent) -> HashMap<String, String> {
    let text = |key: &str| event.data.get(key).and_then(serde_json::Value::as_str);
    let names = CaseNames {
        assignee: text("assignee_name"),
        case_type: text("case_type_name"),
        actor: text("actor_name"),
    };
    let case = event
        .data
        .get("case")
        .and_then(|value| serde_json::from_value::<Case>(value.clone()).ok());

    match case {
        Some(case) => case_context(&case, event.kind, names),
        None => HashMap::from([
            ("event".to_string(), event.kind.to_string()),
            ("actor".to_string(), names.actor.unwrap_or("system").to_string()),
        ]),
    }
}

/// Application service for queued LINE messages.
pub struct NotificationService<N, L, T, M> {
    notifications: Arc<N>,
    channels: Arc<L>,
    templates: Arc<T>,
    messenger: Arc<M>,
    max_attempts: u32,
    /// Serialises outbox passes between the worker and the cron endpoint.
    pass: Mutex<()>,
}

impl<N, L, T, M> NotificationService<N, L, T, M>
where
    N: NotificationRepository + Send + Sync,
    L: LineChannelRepository + Send + Sync,
    T: TemplateRepository + Send + Sync,
    M: LineMessenger + Send + Sync,
{
    pub fn new(
        notifications: Arc<N>,
        channels: Arc<L>,
        templates: Arc<T>,
        messenger: Arc<M>,
        max_attempts: u32,
    ) -> Self {
        Self {
            notifications,
            channels,
            templates,
            messenger,
            max_attempts: max_attempts.max(1),
            pass: Mutex::new(()),
        }
    }

    /// Queue a manual message.
    ///
    /// Without `target` the channel's default target is used.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown channel,
    /// [`MimsError::Validation`] when no target is known or the message is
    /// blank or too long, or a storage error.
    #[tracing::instrument(skip(self, message))]
    pub async fn enqueue(
        &self,
        channel_id: LineChannelId,
        target: Option<String>,
        message: String,
        case_id: Option<CaseId>,
    ) -> Result<Notification, MimsError> {
        let Some(channel) = self.channels.get_by_id(channel_id).await? else {
            return Err(NotFoundError {
                entity: "LineChannel",
                id: channel_id.to_string(),
            }
            .into());
        };
        let target = target
            .filter(|t| !t.trim().is_empty())
            .or(channel.default_target)
            .ok_or(ValidationError::EmptyTarget)?;

        let notification = Notification::pending(channel_id, target, message)?.for_case(case_id);
        self.notifications.enqueue(notification).await
    }

    /// Render every active template for the event into pending rows.
    ///
    /// Templates whose channel is missing, inactive or has no default
    /// target are skipped. A row that cannot be stored is logged and does
    /// not stop the remaining templates.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the templates cannot be loaded.
    pub async fn enqueue_for_event(
        &self,
        event: &CaseEvent,
    ) -> Result<Vec<Notification>, MimsError> {
        let templates = self.templates.find_active_for_event(event.kind).await?;
        if templates.is_empty() {
            return Ok(Vec::new());
        }
        let context = event_context(event);

        let mut queued = Vec::new();
        for template in templates {
            let channel = match self.channels.get_by_id(template.channel_id).await {
                Ok(channel) => channel,
                Err(err) => {
                    tracing::error!(template = %template.id, %err, "loading template channel failed");
                    continue;
                }
            };
            let Some(LineChannel {
                active: true,
                default_target: Some(target),
                ..
            }) = channel
            else {
                tracing::debug!(template = %template.id, "template skipped: channel unavailable or without target");
                continue;
            };

            let message = template.render(&context);
            let notification = match Notification::pending(template.channel_id, target, message) {
                Ok(notification) => notification
                    .from_template(template.id)
                    .for_case(event.case_id),
                Err(err) => {
                    tracing::warn!(template = %template.id, %err, "rendered message rejected");
                    continue;
                }
            };
            match self.notifications.enqueue(notification).await {
                Ok(notification) => queued.push(notification),
                Err(err) => {
                    tracing::error!(template = %template.id, %err, "queueing notification failed");
                }
            }
        }
        if !queued.is_empty() {
            tracing::debug!(event = %event.kind, queued = queued.len(), "notifications queued");
        }
        Ok(queued)
    }

    /// Latest rows, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list(
        &self,
        status: Option<NotificationStatus>,
        limit: u32,
    ) -> Result<Vec<Notification>, MimsError> {
        self.notifications.list(status, limit).await
    }

    /// Look up a row by id.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id, or a storage error.
    pub async fn get(&self, id: NotificationId) -> Result<Notification, MimsError> {
        self.notifications.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Notification",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Put a failed row back in the queue.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id,
    /// [`ValidationError::NotRequeueable`] unless the row failed, or a
    /// storage error.
    pub async fn requeue(&self, id: NotificationId) -> Result<Notification, MimsError> {
        let mut notification = self.get(id).await?;
        notification.requeue()?;
        self.notifications.save_outcome(&notification).await?;
        Ok(notification)
    }

    /// Push up to `batch_size` pending rows, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error when rows cannot be loaded or saved. Delivery
    /// failures are recorded on the rows instead.
    pub async fn process_outbox(&self, batch_size: u32) -> Result<OutboxReport, MimsError> {
        let _pass = self.pass.lock().await;
        let pending = self.notifications.pending(batch_size).await?;
        let mut channels: HashMap<LineChannelId, Option<LineChannel>> = HashMap::new();
        let mut report = OutboxReport::default();

        for mut notification in pending {
            let channel = match channels.entry(notification.channel_id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    entry.insert(self.channels.get_by_id(notification.channel_id).await?)
                }
            };

            match channel {
                Some(channel) if channel.active => {
                    let result = self
                        .messenger
                        .push_text(&channel.access_token, &notification.target, &notification.message)
                        .await
                        .map_err(|err| describe(&err));
                    notification.record_outcome(result, self.max_attempts);
                }
                Some(_) => notification.record_outcome(Err("channel is inactive".into()), 1),
                None => notification.record_outcome(Err("channel no longer exists".into()), 1),
            }

            report.processed += 1;
            if notification.status == NotificationStatus::Sent {
                report.sent += 1;
            } else {
                report.failed += 1;
                tracing::warn!(
                    notification = %notification.id,
                    attempts = notification.attempts,
                    error = notification.last_error.as_deref().unwrap_or_default(),
                    "notification delivery failed"
                );
            }
            self.notifications.save_outcome(&notification).await?;
        }

        if report.processed > 0 {
            tracing::info!(
                processed = report.processed,
                sent = report.sent,
                failed = report.failed,
                "outbox processed"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        InMemoryLineChannels, InMemoryNotifications, InMemoryTemplates, RecordingMessenger,
    };
    use mims_domain::event::EventKind;
    use mims_domain::template::NotificationTemplate;

    type Service = NotificationService<
        InMemoryNotifications,
        InMemoryLineChannels,
        InMemoryTemplates,
        RecordingMessenger,
    >;

    struct Fixture {
        svc: Service,
        outbox: Arc<InMemoryNotifications>,
        channels: Arc<InMemoryLineChannels>,
        templates: Arc<InMemoryTemplates>,
        messenger: Arc<RecordingMessenger>,
        channel: LineChannel,
    }

    async fn fixture(max_attempts: u32) -> Fixture {
        let channels = Arc::new(InMemoryLineChannels::default());
        let templates = Arc::new(InMemoryTemplates::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let channel = channels
            .create(
                LineChannel::builder()
                    .name("Ops")
                    .access_token("token")
                    .default_target("Cgroup")
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        let outbox = Arc::new(InMemoryNotifications::default());
        let svc = NotificationService::new(
            Arc::clone(&outbox),
            Arc::clone(&channels),
            Arc::clone(&templates),
            Arc::clone(&messenger),
            max_attempts,
        );
        Fixture {
            svc,
            outbox,
            channels,
            templates,
            messenger,
            channel,
        }
    }

    fn created_event(case: &Case) -> CaseEvent {
        CaseEvent::new(
            EventKind::CaseCreated,
            Some(case.id),
            None,
            serde_json::json!({
                "case": case,
                "actor_name": "Nok",
                "assignee_name": null,
            }),
        )
    }

    #[tokio::test]
    async fn should_fall_back_to_default_target() {
        let f = fixture(3).await;
        let queued = f
            .svc
            .enqueue(f.channel.id, None, "hello".into(), None)
            .await
            .unwrap();
        assert_eq!(queued.target, "Cgroup");
        assert_eq!(queued.status, NotificationStatus::Pending);
    }

    #[tokio::test]
    async fn should_reject_manual_message_without_any_target() {
        let f = fixture(3).await;
        let mut channel = f.channel.clone();
        channel.default_target = None;
        f.channels.update(channel).await.unwrap();

        let result = f.svc.enqueue(f.channel.id, None, "hello".into(), None).await;
        assert!(matches!(
            result,
            Err(MimsError::Validation(ValidationError::EmptyTarget))
        ));
    }

    #[tokio::test]
    async fn should_render_active_templates_for_event() {
        let f = fixture(3).await;
        for (body, active) in [("New: {{ case.title }} by {{ actor }}", true), ("off", false)] {
            f.templates
                .create(
                    NotificationTemplate::builder()
                        .name("t")
                        .channel_id(f.channel.id)
                        .body(body)
                        .active(active)
                        .build()
                        .unwrap(),
                )
                .await
                .unwrap();
        }
        let case = Case::builder().title("Broken door").build().unwrap();

        let queued = f.svc.enqueue_for_event(&created_event(&case)).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].message, "New: Broken door by Nok");
        assert_eq!(queued[0].case_id, Some(case.id));
        assert!(queued[0].template_id.is_some());
    }

    #[tokio::test]
    async fn should_keep_queueing_after_one_row_is_refused() {
        let f = fixture(3).await;
        for body in ["first {{ case.title }}", "second {{ case.title }}"] {
            f.templates
                .create(
                    NotificationTemplate::builder()
                        .name("t")
                        .channel_id(f.channel.id)
                        .body(body)
                        .build()
                        .unwrap(),
                )
                .await
                .unwrap();
        }
        f.outbox.reject_messages_containing("first");
        let case = Case::builder().title("Broken door").build().unwrap();

        let queued = f.svc.enqueue_for_event(&created_event(&case)).await.unwrap();

        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].message, "second Broken door");
    }

    #[tokio::test]
    async fn should_skip_templates_of_inactive_channels() {
        let f = fixture(3).await;
        let mut channel = f.channel.clone();
        channel.active = false;
        f.channels.update(channel).await.unwrap();
        f.templates
            .create(
                NotificationTemplate::builder()
                    .name("t")
                    .channel_id(f.channel.id)
                    .body("x")
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        let case = Case::builder().title("Leak").build().unwrap();

        assert!(f.svc.enqueue_for_event(&created_event(&case)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_send_pending_rows() {
        let f = fixture(3).await;
        f.svc.enqueue(f.channel.id, None, "one".into(), None).await.unwrap();
        f.svc
            .enqueue(f.channel.id, Some("Uuser".into()), "two".into(), None)
            .await
            .unwrap();

        let report = f.svc.process_outbox(10).await.unwrap();
        assert_eq!(
            report,
            OutboxReport {
                processed: 2,
                sent: 2,
                failed: 0
            }
        );
        assert_eq!(f.messenger.sent().len(), 2);
        assert_eq!(f.svc.process_outbox(10).await.unwrap().processed, 0);
    }

    #[tokio::test]
    async fn should_mark_failed_after_max_attempts_and_allow_requeue() {
        let f = fixture(2).await;
        let queued = f.svc.enqueue(f.channel.id, None, "x".into(), None).await.unwrap();
        f.messenger.fail(true);

        let first = f.svc.process_outbox(10).await.unwrap();
        assert_eq!(first.failed, 1);
        assert_eq!(f.svc.get(queued.id).await.unwrap().status, NotificationStatus::Pending);

        f.svc.process_outbox(10).await.unwrap();
        let failed = f.svc.get(queued.id).await.unwrap();
        assert_eq!(failed.status, NotificationStatus::Failed);
        assert_eq!(failed.attempts, 2);
        assert!(failed.last_error.is_some());

        let requeued = f.svc.requeue(queued.id).await.unwrap();
        assert_eq!(requeued.status, NotificationStatus::Pending);
        assert_eq!(requeued.attempts, 0);

        f.messenger.fail(false);
        assert_eq!(f.svc.process_outbox(10).await.unwrap().sent, 1);
    }

    #[tokio::test]
    async fn should_refuse_to_requeue_pending_row() {
        let f = fixture(3).await;
        let queued = f.svc.enqueue(f.channel.id, None, "x".into(), None).await.unwrap();
        assert!(matches!(
            f.svc.requeue(queued.id).await,
            Err(MimsError::Validation(ValidationError::NotRequeueable))
        ));
    }

    #[tokio::test]
    async fn should_fail_rows_of_inactive_channel_immediately() {
        let f = fixture(5).await;
        let queued = f.svc.enqueue(f.channel.id, None, "x".into(), None).await.unwrap();
        let mut channel = f.channel.clone();
        channel.active = false;
        f.channels.update(channel).await.unwrap();

        let report = f.svc.process_outbox(10).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(f.svc.get(queued.id).await.unwrap().status, NotificationStatus::Failed);
        assert!(f.messenger.sent().is_empty());
    }
}
