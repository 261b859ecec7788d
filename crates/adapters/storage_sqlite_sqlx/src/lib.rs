//! # mims-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `mims-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `mims-app` (for port traits) and `mims-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod codec;

pub mod activity_repo;
pub mod attachment_repo;
pub mod case_repo;
pub mod case_type_repo;
pub mod error;
pub mod line_channel_repo;
pub mod notification_repo;
pub mod pool;
pub mod provider_repo;
pub mod session_repo;
pub mod template_repo;
pub mod user_repo;
pub mod webhook_repo;

pub use activity_repo::SqliteActivityRepository;
pub use attachment_repo::SqliteAttachmentRepository;
pub use case_repo::SqliteCaseRepository;
pub use case_type_repo::SqliteCaseTypeRepository;
pub use line_channel_repo::SqliteLineChannelRepository;
pub use notification_repo::SqliteNotificationRepository;
pub use pool::{Config, Database};
pub use provider_repo::SqliteProviderRepository;
pub use session_repo::SqliteSessionRepository;
pub use template_repo::SqliteTemplateRepository;
pub use user_repo::SqliteUserRepository;
pub use webhook_repo::SqliteWebhookRepository;
