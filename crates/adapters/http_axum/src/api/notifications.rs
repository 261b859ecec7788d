//! JSON REST handlers for the LINE notification outbox.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use mims_app::ports::Backend;
use mims_app::services::notification_service::OutboxReport;
use mims_domain::id::{CaseId, LineChannelId};
use mims_domain::notification::{Notification, NotificationStatus};
use mims_domain::user::Permission;

use super::parse_id;
use crate::auth::{CurrentUser, authenticate};
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the shared secret of the scheduler.
pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 200;

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<NotificationStatus>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct EnqueueRequest {
    pub channel_id: LineChannelId,
    /// Falls back to the channel default target.
    pub target: Option<String>,
    pub message: String,
    pub case_id: Option<CaseId>,
}

/// Possible responses from the outbox endpoints.
pub enum NotificationResponse {
    List(Json<Vec<Notification>>),
    Ok(Json<Notification>),
    Created(Json<Notification>),
    Report(Json<OutboxReport>),
}

impl IntoResponse for NotificationResponse {
    fn into_response(self) -> Response {
        match self {
            Self::List(json) => json.into_response(),
            Self::Ok(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::Report(json) => json.into_response(),
        }
    }
}

/// Byte comparison whose duration does not depend on where inputs differ.
fn secrets_match(given: &[u8], expected: &[u8]) -> bool {
    given.len() == expected.len()
        && given
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// `GET /api/notifications`
pub async fn list<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<NotificationResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let rows = state.notifications.list(params.status, limit).await?;
    Ok(NotificationResponse::List(Json(rows)))
}

/// `POST /api/notifications`
pub async fn enqueue<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Json(req): Json<EnqueueRequest>,
) -> Result<NotificationResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let notification = state
        .notifications
        .enqueue(req.channel_id, req.target, req.message, req.case_id)
        .await?;
    Ok(NotificationResponse::Created(Json(notification)))
}

/// `POST /api/notifications/{id}/requeue`
pub async fn requeue<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<NotificationResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let notification = state
        .notifications
        .requeue(parse_id(&id, "notification")?)
        .await?;
    Ok(NotificationResponse::Ok(Json(notification)))
}

/// `POST /api/notifications/process`
///
/// Called by a scheduler with `X-Cron-Secret`, or by a user allowed to
/// manage settings.
pub async fn process<B: Backend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
) -> Result<NotificationResponse, ApiError> {
    let cron = headers
        .get(CRON_SECRET_HEADER)
        .map(|value| value.as_bytes())
        .zip(state.settings.cron_secret.as_deref())
        .is_some_and(|(given, expected)| secrets_match(given, expected.as_bytes()));
    if !cron {
        authenticate(&state, &headers)
            .await?
            .require(Permission::ManageSettings)?;
    }

    let report = state
        .notifications
        .process_outbox(state.settings.outbox_batch_size)
        .await?;
    tracing::info!(
        processed = report.processed,
        sent = report.sent,
        failed = report.failed,
        cron,
        "outbox processed"
    );
    Ok(NotificationResponse::Report(Json(report)))
}
