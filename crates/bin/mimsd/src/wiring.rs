//! Concrete adapters plugged into the application services.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use mims_adapter_blob_fs::FsBlobStore;
use mims_adapter_http_axum::state::{AppState, HttpSettings};
use mims_adapter_line_reqwest::ReqwestLineMessenger;
use mims_adapter_storage_sqlite_sqlx::{
    Database, SqliteActivityRepository, SqliteAttachmentRepository, SqliteCaseRepository,
    SqliteCaseTypeRepository, SqliteLineChannelRepository, SqliteNotificationRepository,
    SqliteProviderRepository, SqliteSessionRepository, SqliteTemplateRepository,
    SqliteUserRepository, SqliteWebhookRepository,
};
use mims_adapter_webhook_reqwest::ReqwestWebhookSender;
use mims_app::event_bus::InProcessEventBus;
use mims_app::ports::Backend;
use mims_app::rate_limiter::RateLimiter;
use mims_app::services::attachment_service::AttachmentService;
use mims_app::services::auth_service::{AuthService, AuthSettings};
use mims_app::services::case_service::CaseService;
use mims_app::services::case_type_service::CaseTypeService;
use mims_app::services::event_handler::EventHandler;
use mims_app::services::line_channel_service::LineChannelService;
use mims_app::services::notification_service::NotificationService;
use mims_app::services::provider_service::ProviderService;
use mims_app::services::template_service::TemplateService;
use mims_app::services::user_service::UserService;
use mims_app::services::webhook_dispatcher::WebhookDispatcher;
use mims_app::services::webhook_service::WebhookService;

use crate::config::Config;

/// Capacity of the in-process event bus.
const EVENT_BUS_CAPACITY: usize = 256;

/// `SQLite` repositories, filesystem blobs and reqwest-based deliveries.
pub struct SqliteBackend;

impl Backend for SqliteBackend {
    type Cases = SqliteCaseRepository;
    type CaseTypes = SqliteCaseTypeRepository;
    type Activities = SqliteActivityRepository;
    type Attachments = SqliteAttachmentRepository;
    type Providers = SqliteProviderRepository;
    type Users = SqliteUserRepository;
    type Sessions = SqliteSessionRepository;
    type Webhooks = SqliteWebhookRepository;
    type LineChannels = SqliteLineChannelRepository;
    type Templates = SqliteTemplateRepository;
    type Notifications = SqliteNotificationRepository;
    type Blobs = FsBlobStore;
    type Publisher = Arc<InProcessEventBus>;
    type Sender = ReqwestWebhookSender;
    type Messenger = ReqwestLineMessenger;
}

/// Background consumer of case events.
pub type Events = EventHandler<
    SqliteWebhookRepository,
    ReqwestWebhookSender,
    SqliteNotificationRepository,
    SqliteLineChannelRepository,
    SqliteTemplateRepository,
    ReqwestLineMessenger,
>;

/// The assembled application: HTTP state plus the event consumer.
pub struct Mims {
    pub state: AppState<SqliteBackend>,
    pub events: Events,
}

/// Build every repository, adapter and service from `config`.
///
/// # Errors
///
/// Returns an error if the attachment directory or an HTTP client cannot be
/// set up.
pub async fn assemble(config: &Config, db: &Database) -> anyhow::Result<Mims> {
    let pool = db.pool();
    let cases = Arc::new(SqliteCaseRepository::new(pool.clone()));
    let case_types = Arc::new(SqliteCaseTypeRepository::new(pool.clone()));
    let providers = Arc::new(SqliteProviderRepository::new(pool.clone()));
    let activities = Arc::new(SqliteActivityRepository::new(pool.clone()));
    let attachments = Arc::new(SqliteAttachmentRepository::new(pool.clone()));
    let users = Arc::new(SqliteUserRepository::new(pool.clone()));
    let sessions = Arc::new(SqliteSessionRepository::new(pool.clone()));
    let webhooks = Arc::new(SqliteWebhookRepository::new(pool.clone()));
    let channels = Arc::new(SqliteLineChannelRepository::new(pool.clone()));
    let templates = Arc::new(SqliteTemplateRepository::new(pool.clone()));
    let outbox = Arc::new(SqliteNotificationRepository::new(pool.clone()));

    let attachment_dir = &config.attachments.directory;
    let blobs = Arc::new(
        FsBlobStore::open(attachment_dir)
            .await
            .with_context(|| format!("opening attachment directory {attachment_dir}"))?,
    );
    let sender = Arc::new(
        ReqwestWebhookSender::new(&config.webhooks).context("building webhook client")?,
    );
    let messenger =
        Arc::new(ReqwestLineMessenger::new(&config.line).context("building LINE client")?);
    let bus = Arc::new(InProcessEventBus::new(EVENT_BUS_CAPACITY));

    let notifications = Arc::new(NotificationService::new(
        Arc::clone(&outbox),
        Arc::clone(&channels),
        Arc::clone(&templates),
        messenger,
        config.outbox.max_attempts,
    ));
    let events = EventHandler::new(
        Arc::new(WebhookDispatcher::new(
            Arc::clone(&webhooks),
            Arc::clone(&sender),
        )),
        Arc::clone(&notifications),
    );

    let state = AppState {
        cases: Arc::new(CaseService::new(
            Arc::clone(&cases),
            Arc::clone(&case_types),
            Arc::clone(&providers),
            Arc::clone(&activities),
            Arc::clone(&users),
            Arc::clone(&bus),
        )),
        case_types: Arc::new(CaseTypeService::new(case_types, Arc::clone(&cases))),
        providers: Arc::new(ProviderService::new(providers, Arc::clone(&cases))),
        users: Arc::new(UserService::new(Arc::clone(&users), Arc::clone(&sessions))),
        auth: Arc::new(AuthService::new(
            users,
            sessions,
            AuthSettings {
                session_ttl: Duration::from_secs(config.auth.session_ttl_secs),
                login_max_attempts: config.auth.login_max_attempts,
                login_window: Duration::from_secs(config.auth.login_window_secs),
            },
        )),
        attachments: Arc::new(AttachmentService::new(
            cases,
            attachments,
            activities,
            blobs,
            config.attachments.max_bytes,
        )),
        webhooks: Arc::new(WebhookService::new(webhooks, sender)),
        line_channels: Arc::new(LineChannelService::new(
            Arc::clone(&channels),
            Arc::clone(&templates),
        )),
        templates: Arc::new(TemplateService::new(templates, channels)),
        notifications,
        event_bus: bus,
        rate_limiter: Arc::new(RateLimiter::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_secs),
        )),
        settings: Arc::new(HttpSettings {
            cron_secret: config.outbox.cron_secret.clone(),
            secure_cookie: config.auth.secure_cookie,
            session_ttl_secs: config.auth.session_ttl_secs,
            outbox_batch_size: config.outbox.batch_size,
        }),
    };

    Ok(Mims { state, events })
}
