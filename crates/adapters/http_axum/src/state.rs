//! Shared application state for axum handlers.

use std::sync::Arc;

use mims_app::event_bus::InProcessEventBus;
use mims_app::ports::Backend;
use mims_app::rate_limiter::RateLimiter;
use mims_app::services::attachment_service::AttachmentService;
use mims_app::services::auth_service::AuthService;
use mims_app::services::case_service::CaseService;
use mims_app::services::case_type_service::CaseTypeService;
use mims_app::services::line_channel_service::LineChannelService;
use mims_app::services::notification_service::NotificationService;
use mims_app::services::provider_service::ProviderService;
use mims_app::services::template_service::TemplateService;
use mims_app::services::user_service::UserService;
use mims_app::services::webhook_service::WebhookService;

pub type Cases<B> = CaseService<
    <B as Backend>::Cases,
    <B as Backend>::CaseTypes,
    <B as Backend>::Providers,
    <B as Backend>::Activities,
    <B as Backend>::Users,
    <B as Backend>::Publisher,
>;
pub type CaseTypes<B> = CaseTypeService<<B as Backend>::CaseTypes, <B as Backend>::Cases>;
pub type Providers<B> = ProviderService<<B as Backend>::Providers, <B as Backend>::Cases>;
pub type Users<B> = UserService<<B as Backend>::Users, <B as Backend>::Sessions>;
pub type Auth<B> = AuthService<<B as Backend>::Users, <B as Backend>::Sessions>;
pub type Attachments<B> = AttachmentService<
    <B as Backend>::Cases,
    <B as Backend>::Attachments,
    <B as Backend>::Activities,
    <B as Backend>::Blobs,
>;
pub type Webhooks<B> = WebhookService<<B as Backend>::Webhooks, <B as Backend>::Sender>;
pub type LineChannels<B> =
    LineChannelService<<B as Backend>::LineChannels, <B as Backend>::Templates>;
pub type Templates<B> = TemplateService<<B as Backend>::Templates, <B as Backend>::LineChannels>;
pub type Notifications<B> = NotificationService<
    <B as Backend>::Notifications,
    <B as Backend>::LineChannels,
    <B as Backend>::Templates,
    <B as Backend>::Messenger,
>;

/// Transport-level settings that are not owned by any service.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Shared secret accepted in `X-Cron-Secret` by the outbox endpoint.
    pub cron_secret: Option<String>,
    /// Adds `Secure` to the session cookie.
    pub secure_cookie: bool,
    /// `Max-Age` of the session cookie, in seconds.
    pub session_ttl_secs: u64,
    /// Rows handled by one outbox pass triggered over HTTP.
    pub outbox_batch_size: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            cron_secret: None,
            secure_cookie: false,
            session_ttl_secs: 12 * 60 * 60,
            outbox_batch_size: 50,
        }
    }
}

/// Application state shared across all axum handlers.
///
/// Generic over a single [`Backend`] to avoid dynamic dispatch.
/// `Clone` is implemented manually so the underlying types themselves do not
/// need to be `Clone`; only the `Arc` wrappers are cloned.
pub struct AppState<B: Backend> {
    pub cases: Arc<Cases<B>>,
    pub case_types: Arc<CaseTypes<B>>,
    pub providers: Arc<Providers<B>>,
    pub users: Arc<Users<B>>,
    pub auth: Arc<Auth<B>>,
    pub attachments: Arc<Attachments<B>>,
    pub webhooks: Arc<Webhooks<B>>,
    pub line_channels: Arc<LineChannels<B>>,
    pub templates: Arc<Templates<B>>,
    pub notifications: Arc<Notifications<B>>,
    /// Bus the SSE stream subscribes to.
    pub event_bus: Arc<InProcessEventBus>,
    /// Per-client limiter applied to `/api`.
    pub rate_limiter: Arc<RateLimiter>,
    pub settings: Arc<HttpSettings>,
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            cases: Arc::clone(&self.cases),
            case_types: Arc::clone(&self.case_types),
            providers: Arc::clone(&self.providers),
            users: Arc::clone(&self.users),
            auth: Arc::clone(&self.auth),
            attachments: Arc::clone(&self.attachments),
            webhooks: Arc::clone(&self.webhooks),
            line_channels: Arc::clone(&self.line_channels),
            templates: Arc::clone(&self.templates),
            notifications: Arc::clone(&self.notifications),
            event_bus: Arc::clone(&self.event_bus),
            rate_limiter: Arc::clone(&self.rate_limiter),
            settings: Arc::clone(&self.settings),
        }
    }
}
