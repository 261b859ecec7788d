//! Event bus port: publish/subscribe for case events.

use std::future::Future;

use mims_domain::error::MimsError;
use mims_domain::event::CaseEvent;

/// Publishes case events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: CaseEvent) -> impl Future<Output = Result<(), MimsError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: CaseEvent) -> impl Future<Output = Result<(), MimsError>> + Send {
        (**self).publish(event)
    }
}
