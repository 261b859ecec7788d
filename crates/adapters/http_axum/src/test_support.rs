//! In-memory application wiring shared by the handler tests.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use mims_app::event_bus::InProcessEventBus;
use mims_app::ports::{SessionRepository, UserRepository};
use mims_app::rate_limiter::RateLimiter;
use mims_app::services::attachment_service::AttachmentService;
use mims_app::services::auth_service::{AuthService, AuthSettings};
use mims_app::services::case_service::CaseService;
use mims_app::services::case_type_service::CaseTypeService;
use mims_app::services::line_channel_service::LineChannelService;
use mims_app::services::notification_service::NotificationService;
use mims_app::services::provider_service::ProviderService;
use mims_app::services::template_service::TemplateService;
use mims_app::services::user_service::UserService;
use mims_app::services::webhook_service::WebhookService;
use mims_app::testing::{
    InMemoryActivities, InMemoryAttachments, InMemoryBackend, InMemoryBlobs, InMemoryCaseTypes,
    InMemoryCases, InMemoryLineChannels, InMemoryNotifications, InMemoryProviders,
    InMemorySessions, InMemoryTemplates, InMemoryUsers, InMemoryWebhooks, RecordingMessenger,
    RecordingSender,
};
use mims_domain::user::{Role, Session, User};

use crate::state::{AppState, HttpSettings};

pub(crate) struct TestApp {
    pub state: AppState<InMemoryBackend>,
    pub users: Arc<InMemoryUsers>,
    pub sessions: Arc<InMemorySessions>,
    pub sender: Arc<RecordingSender>,
    pub messenger: Arc<RecordingMessenger>,
    pub bus: Arc<InProcessEventBus>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(HttpSettings::default(), RateLimiter::new(1000, Duration::from_secs(60)))
    }

    pub fn with(settings: HttpSettings, rate_limiter: RateLimiter) -> Self {
        let cases = Arc::new(InMemoryCases::default());
        let case_types = Arc::new(InMemoryCaseTypes::default());
        let providers = Arc::new(InMemoryProviders::default());
        let activities = Arc::new(InMemoryActivities::default());
        let attachments = Arc::new(InMemoryAttachments::default());
        let users = Arc::new(InMemoryUsers::default());
        let sessions = Arc::new(InMemorySessions::default());
        let webhooks = Arc::new(InMemoryWebhooks::default());
        let channels = Arc::new(InMemoryLineChannels::default());
        let templates = Arc::new(InMemoryTemplates::default());
        let outbox = Arc::new(InMemoryNotifications::default());
        let sender = Arc::new(RecordingSender::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let bus = Arc::new(InProcessEventBus::new(64));

        let state = AppState {
            cases: Arc::new(CaseService::new(
                Arc::clone(&cases),
                Arc::clone(&case_types),
                Arc::clone(&providers),
                Arc::clone(&activities),
                Arc::clone(&users),
                Arc::clone(&bus),
            )),
            case_types: Arc::new(CaseTypeService::new(
                Arc::clone(&case_types),
                Arc::clone(&cases),
            )),
            providers: Arc::new(ProviderService::new(providers, Arc::clone(&cases))),
            users: Arc::new(UserService::new(Arc::clone(&users), Arc::clone(&sessions))),
            auth: Arc::new(AuthService::new(
                Arc::clone(&users),
                Arc::clone(&sessions),
                AuthSettings::default(),
            )),
            attachments: Arc::new(AttachmentService::new(
                cases,
                attachments,
                activities,
                Arc::new(InMemoryBlobs::default()),
                1024,
            )),
            webhooks: Arc::new(WebhookService::new(webhooks, Arc::clone(&sender))),
            line_channels: Arc::new(LineChannelService::new(
                Arc::clone(&channels),
                Arc::clone(&templates),
            )),
            templates: Arc::new(TemplateService::new(
                Arc::clone(&templates),
                Arc::clone(&channels),
            )),
            notifications: Arc::new(NotificationService::new(
                outbox,
                channels,
                templates,
                Arc::clone(&messenger),
                3,
            )),
            event_bus: Arc::clone(&bus),
            rate_limiter: Arc::new(rate_limiter),
            settings: Arc::new(settings),
        };

        Self {
            state,
            users,
            sessions,
            sender,
            messenger,
            bus,
        }
    }

    pub fn router(&self) -> Router {
        crate::router::build(self.state.clone())
    }

    /// Create an account with `role` and return a bearer token for it.
    pub async fn login_as(&self, role: Role) -> (User, String) {
        let user = self
            .users
            .create(
                User::builder()
                    .email(format!("{}-{}@example.com", role.as_str(), uuid_suffix()))
                    .display_name(format!("{} user", role.as_str()))
                    .role(role)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        let session = self
            .sessions
            .create(Session::open(user.id, chrono::Duration::hours(1)))
            .await
            .unwrap();
        (user, session.token.as_str().to_string())
    }
}

fn uuid_suffix() -> String {
    mims_domain::id::UserId::new().to_string()[..8].to_string()
}

/// Build a request with an optional bearer token and JSON body.
pub(crate) fn request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request and return status, headers and the JSON body (`Null` when empty).
pub(crate) async fn send(
    router: Router,
    request: Request<Body>,
) -> (StatusCode, HeaderMap, serde_json::Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, headers, json)
}
