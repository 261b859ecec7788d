//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod backend;
pub mod blob_store;
pub mod delivery;
pub mod event_bus;
pub mod identity_repo;
pub mod notification_repo;
pub mod storage;

pub use backend::Backend;
pub use blob_store::BlobStore;
pub use delivery::{LineMessenger, WebhookRequest, WebhookSender};
pub use event_bus::EventPublisher;
pub use identity_repo::{SessionRepository, UserRepository};
pub use notification_repo::{
    LineChannelRepository, NotificationRepository, TemplateRepository, WebhookRepository,
};
pub use storage::{
    ActivityRepository, AttachmentRepository, CaseCounts, CaseRepository, CaseTypeRepository,
    ProviderRepository,
};
