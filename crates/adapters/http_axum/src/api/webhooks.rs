//! JSON REST handlers for outbound webhooks.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use mims_app::ports::Backend;
use mims_domain::event::EventKind;
use mims_domain::id::WebhookId;
use mims_domain::user::Permission;
use mims_domain::webhook::{DeliveryOutcome, Webhook};

use super::parse_id;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateWebhookRequest {
    pub name: String,
    pub url: String,
    pub events: Vec<EventKind>,
    /// Generated when omitted.
    pub secret: Option<String>,
    pub active: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateWebhookRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub events: Option<Vec<EventKind>>,
    pub secret: Option<String>,
    pub active: Option<bool>,
}

impl UpdateWebhookRequest {
    fn apply(self, webhook: &mut Webhook) {
        if let Some(name) = self.name {
            webhook.name = name.trim().to_string();
        }
        if let Some(url) = self.url {
            webhook.url = url.trim().to_string();
        }
        if let Some(events) = self.events {
            webhook.events.clear();
            for kind in events {
                if !webhook.events.contains(&kind) {
                    webhook.events.push(kind);
                }
            }
        }
        if let Some(secret) = self.secret {
            webhook.secret = secret;
        }
        if let Some(active) = self.active {
            webhook.active = active;
        }
    }
}

/// A webhook together with its signing secret, returned only when the
/// secret is first issued.
#[derive(Serialize)]
pub struct IssuedWebhook {
    #[serde(flatten)]
    pub webhook: Webhook,
    pub secret: String,
}

impl From<Webhook> for IssuedWebhook {
    fn from(webhook: Webhook) -> Self {
        let secret = webhook.secret.clone();
        Self { webhook, secret }
    }
}

/// Possible responses from the webhook endpoints.
pub enum WebhookResponse {
    List(Json<Vec<Webhook>>),
    Ok(Json<Webhook>),
    Issued(Json<IssuedWebhook>),
    Created(Json<IssuedWebhook>),
    Delivery(Json<DeliveryOutcome>),
    NoContent,
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        match self {
            Self::List(json) => json.into_response(),
            Self::Ok(json) => json.into_response(),
            Self::Issued(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::Delivery(json) => json.into_response(),
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/webhooks`
pub async fn list<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
) -> Result<WebhookResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let webhooks = state.webhooks.list_webhooks().await?;
    Ok(WebhookResponse::List(Json(webhooks)))
}

/// `POST /api/webhooks`
pub async fn create<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Json(req): Json<CreateWebhookRequest>,
) -> Result<WebhookResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let mut builder = Webhook::builder()
        .name(req.name)
        .url(req.url)
        .events(req.events)
        .active(req.active.unwrap_or(true));
    if let Some(secret) = req.secret {
        builder = builder.secret(secret);
    }
    let webhook = state.webhooks.create_webhook(builder.build()?).await?;
    Ok(WebhookResponse::Created(Json(webhook.into())))
}

/// `GET /api/webhooks/{id}`
pub async fn get<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<WebhookResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let webhook = state
        .webhooks
        .get_webhook(parse_id(&id, "webhook")?)
        .await?;
    Ok(WebhookResponse::Ok(Json(webhook)))
}

/// `PATCH /api/webhooks/{id}`
pub async fn update<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateWebhookRequest>,
) -> Result<WebhookResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let id: WebhookId = parse_id(&id, "webhook")?;
    let mut webhook = state.webhooks.get_webhook(id).await?;
    req.apply(&mut webhook);
    let webhook = state.webhooks.update_webhook(webhook).await?;
    Ok(WebhookResponse::Ok(Json(webhook)))
}

/// `DELETE /api/webhooks/{id}`
pub async fn delete<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<WebhookResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    state
        .webhooks
        .delete_webhook(parse_id(&id, "webhook")?)
        .await?;
    Ok(WebhookResponse::NoContent)
}

/// `POST /api/webhooks/{id}/test`
///
/// Answers 200 with the outcome even when the remote rejected the ping.
pub async fn send_test<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<WebhookResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let outcome = state
        .webhooks
        .send_test(parse_id(&id, "webhook")?)
        .await?;
    Ok(WebhookResponse::Delivery(Json(outcome)))
}

/// `POST /api/webhooks/{id}/rotate-secret`
pub async fn rotate_secret<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<WebhookResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let webhook = state
        .webhooks
        .rotate_secret(parse_id(&id, "webhook")?)
        .await?;
    tracing::info!(webhook = %webhook.id, "webhook secret rotated");
    Ok(WebhookResponse::Issued(Json(webhook.into())))
}
