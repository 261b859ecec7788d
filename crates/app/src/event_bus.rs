//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::{broadcast, watch};

use mims_domain::error::MimsError;
use mims_domain::event::CaseEvent;

use crate::ports::EventPublisher;

/// Case event fan-out over a tokio [`broadcast`] channel.
///
/// The event handler and every open SSE stream hold their own receiver.
/// Events published while nobody listens are discarded.
///
/// [`close`](Self::close) flags the bus as shutting down; the broadcast
/// channel itself stays open while any service holds the bus. Long-lived
/// listeners watch [`closing`](Self::closing) to end on their own.
pub struct InProcessEventBus {
    sender: broadcast::Sender<CaseEvent>,
    closing: watch::Sender<bool>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        let (closing, _) = watch::channel(false);
        Self { sender, closing }
    }

    /// Flag the bus as shutting down. Publishing keeps working.
    pub fn close(&self) {
        self.closing.send_replace(true);
        tracing::debug!("event bus closing");
    }

    /// Watch the shutdown flag; the current value is `true` once closed.
    #[must_use]
    pub fn closing(&self) -> watch::Receiver<bool> {
        self.closing.subscribe()
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CaseEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: CaseEvent) -> impl Future<Output = Result<(), MimsError>> + Send {
        match self.sender.send(event) {
            Ok(receivers) => tracing::trace!(receivers, "case event published"),
            // only fails without receivers
            Err(broadcast::error::SendError(event)) => {
                tracing::debug!(event = %event.kind, "case event dropped, nobody listening");
            }
        }
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mims_domain::event::EventKind;
    use mims_domain::id::CaseId;

    #[tokio::test]
    async fn should_deliver_event_to_every_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut webhooks = bus.subscribe();
        let mut stream = bus.subscribe();

        let event = CaseEvent::new(
            EventKind::CaseCreated,
            Some(CaseId::new()),
            None,
            serde_json::json!({}),
        );
        let event_id = event.id;
        bus.publish(event).await.unwrap();

        assert_eq!(webhooks.recv().await.unwrap().id, event_id);
        assert_eq!(stream.recv().await.unwrap().id, event_id);
    }

    #[tokio::test]
    async fn should_flag_closing_to_existing_and_late_watchers() {
        let bus = InProcessEventBus::new(16);
        let mut early = bus.closing();
        assert!(!*early.borrow());

        bus.close();

        early.changed().await.unwrap();
        assert!(*early.borrow());
        assert!(*bus.closing().borrow());
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        let event = CaseEvent::new(EventKind::CaseDeleted, None, None, serde_json::json!({}));
        assert!(bus.publish(event).await.is_ok());
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(CaseEvent::new(
            EventKind::CaseUpdated,
            None,
            None,
            serde_json::json!({}),
        ))
        .await
        .unwrap();

        let mut rx = bus.subscribe();
        let later = CaseEvent::new(EventKind::CaseCommented, None, None, serde_json::json!({}));
        let later_id = later.id;
        bus.publish(later).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().id, later_id);
    }
}
