//! Backend: the set of concrete port implementations a deployment wires together.
//!
//! Driving adapters (HTTP) are generic over a single `Backend` instead of one
//! type parameter per port. The binary crate provides the concrete impl.

use super::{
    ActivityRepository, AttachmentRepository, BlobStore, CaseRepository, CaseTypeRepository,
    EventPublisher, LineChannelRepository, LineMessenger, NotificationRepository,
    ProviderRepository, SessionRepository, TemplateRepository, UserRepository, WebhookRepository,
    WebhookSender,
};

/// Associated port types of one deployment.
pub trait Backend: Send + Sync + 'static {
    type Cases: CaseRepository + Send + Sync + 'static;
    type CaseTypes: CaseTypeRepository + Send + Sync + 'static;
    type Activities: ActivityRepository + Send + Sync + 'static;
    type Attachments: AttachmentRepository + Send + Sync + 'static;
    type Providers: ProviderRepository + Send + Sync + 'static;
    type Users: UserRepository + Send + Sync + 'static;
    type Sessions: SessionRepository + Send + Sync + 'static;
    type Webhooks: WebhookRepository + Send + Sync + 'static;
    type LineChannels: LineChannelRepository + Send + Sync + 'static;
    type Templates: TemplateRepository + Send + Sync + 'static;
    type Notifications: NotificationRepository + Send + Sync + 'static;
    type Blobs: BlobStore + Send + Sync + 'static;
    type Publisher: EventPublisher + Send + Sync + 'static;
    type Sender: WebhookSender + Send + Sync + 'static;
    type Messenger: LineMessenger + Send + Sync + 'static;
}
