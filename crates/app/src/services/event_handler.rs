//! Event handler: reacts to case events published on the bus.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use mims_domain::event::CaseEvent;

use super::notification_service::NotificationService;
use super::webhook_dispatcher::WebhookDispatcher;
use crate::ports::{
    LineChannelRepository, LineMessenger, NotificationRepository, TemplateRepository,
    WebhookRepository, WebhookSender,
};

/// Delivers each event to webhooks and queues its LINE notifications.
pub struct EventHandler<W, S, N, L, T, M> {
    dispatcher: Arc<WebhookDispatcher<W, S>>,
    notifications: Arc<NotificationService<N, L, T, M>>,
}

impl<W, S, N, L, T, M> EventHandler<W, S, N, L, T, M>
where
    W: WebhookRepository + Send + Sync,
    S: WebhookSender + Send + Sync,
    N: NotificationRepository + Send + Sync,
    L: LineChannelRepository + Send + Sync,
    T: TemplateRepository + Send + Sync,
    M: LineMessenger + Send + Sync,
{
    pub fn new(
        dispatcher: Arc<WebhookDispatcher<W, S>>,
        notifications: Arc<NotificationService<N, L, T, M>>,
    ) -> Self {
        Self {
            dispatcher,
            notifications,
        }
    }

    /// Handle one event. Failures are logged and swallowed.
    pub async fn handle(&self, event: &CaseEvent) {
        if let Err(err) = self.dispatcher.dispatch(event).await {
            tracing::error!(event = %event.kind, %err, "webhook dispatch failed");
        }
        if let Err(err) = self.notifications.enqueue_for_event(event).await {
            tracing::error!(event = %event.kind, %err, "queueing notifications failed");
        }
    }

    /// Consume the bus until every sender is dropped or `shutdown` resolves.
    ///
    /// On shutdown the events already queued on the receiver are still
    /// handled before returning.
    pub async fn run(
        self,
        mut receiver: Receiver<CaseEvent>,
        shutdown: impl Future<Output = ()>,
    ) {
        let mut shutdown = std::pin::pin!(shutdown);
        loop {
            tokio::select! {
                received = receiver.recv() => match received {
                    Ok(event) => self.handle(&event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event handler lagged behind");
                    }
                    Err(RecvError::Closed) => break,
                },
                () = &mut shutdown => {
                    self.drain(&mut receiver).await;
                    break;
                }
            }
        }
        tracing::debug!("event handler stopped");
    }

    async fn drain(&self, receiver: &mut Receiver<CaseEvent>) {
        let mut drained = 0_usize;
        loop {
            match receiver.try_recv() {
                Ok(event) => {
                    self.handle(&event).await;
                    drained += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event handler lagged behind");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        if drained > 0 {
            tracing::info!(drained, "queued events handled before shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::InProcessEventBus;
    use crate::ports::EventPublisher;
    use crate::testing::{
        InMemoryLineChannels, InMemoryNotifications, InMemoryTemplates, InMemoryWebhooks,
        RecordingMessenger, RecordingSender,
    };
    use mims_domain::event::EventKind;
    use mims_domain::line_channel::LineChannel;
    use mims_domain::template::NotificationTemplate;
    use mims_domain::webhook::Webhook;

    #[tokio::test]
    async fn should_dispatch_and_queue_until_bus_closes() {
        let webhooks = Arc::new(InMemoryWebhooks::default());
        webhooks
            .create(
                Webhook::builder()
                    .name("erp")
                    .url("https://erp.example/hook")
                    .event(EventKind::CaseDeleted)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        let channels = Arc::new(InMemoryLineChannels::default());
        let channel = channels
            .create(
                LineChannel::builder()
                    .name("Ops")
                    .access_token("t")
                    .default_target("Cgroup")
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        let templates = Arc::new(InMemoryTemplates::default());
        templates
            .create(
                NotificationTemplate::builder()
                    .name("deleted")
                    .event(EventKind::CaseDeleted)
                    .channel_id(channel.id)
                    .body("{{ event }} by {{ actor }}")
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        let sender = Arc::new(RecordingSender::default());
        let outbox = Arc::new(InMemoryNotifications::default());
        let notifications = Arc::new(NotificationService::new(
            Arc::clone(&outbox),
            channels,
            templates,
            Arc::new(RecordingMessenger::default()),
            3,
        ));
        let handler = EventHandler::new(
            Arc::new(WebhookDispatcher::new(webhooks, Arc::clone(&sender))),
            notifications,
        );

        let bus = InProcessEventBus::new(8);
        let task = tokio::spawn(handler.run(bus.subscribe(), std::future::pending()));
        bus.publish(CaseEvent::new(
            EventKind::CaseDeleted,
            None,
            None,
            serde_json::json!({}),
        ))
        .await
        .unwrap();
        drop(bus);
        task.await.unwrap();

        assert_eq!(sender.requests().len(), 1);
        let queued = outbox.list(None, 10).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].message, "case.deleted by system");
    }

    #[tokio::test]
    async fn should_handle_queued_events_on_shutdown_while_bus_is_alive() {
        let webhooks = Arc::new(InMemoryWebhooks::default());
        webhooks
            .create(
                Webhook::builder()
                    .name("erp")
                    .url("https://erp.example/hook")
                    .event(EventKind::CaseCreated)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        let sender = Arc::new(RecordingSender::default());
        let notifications = Arc::new(NotificationService::new(
            Arc::new(InMemoryNotifications::default()),
            Arc::new(InMemoryLineChannels::default()),
            Arc::new(InMemoryTemplates::default()),
            Arc::new(RecordingMessenger::default()),
            3,
        ));
        let handler = EventHandler::new(
            Arc::new(WebhookDispatcher::new(webhooks, Arc::clone(&sender))),
            notifications,
        );

        let bus = InProcessEventBus::new(8);
        let receiver = bus.subscribe();
        for _ in 0..3 {
            bus.publish(CaseEvent::new(
                EventKind::CaseCreated,
                None,
                None,
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        }
        handler.run(receiver, std::future::ready(())).await;

        assert_eq!(sender.requests().len(), 3);
        drop(bus);
    }
}
