//! Attachment upload and download.
//!
//! Uploads take the raw file as the request body; the name comes from the
//! `file_name` query parameter and the type from `Content-Type`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use mims_app::ports::Backend;
use mims_domain::attachment::Attachment;
use mims_domain::user::Permission;

use super::parse_id;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Deserialize)]
pub struct UploadParams {
    pub file_name: String,
}

/// Possible responses from the attachment endpoints.
pub enum AttachmentResponse {
    List(Json<Vec<Attachment>>),
    Created(Json<Attachment>),
    Content(Attachment, Vec<u8>),
    NoContent,
}

impl IntoResponse for AttachmentResponse {
    fn into_response(self) -> Response {
        match self {
            Self::List(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::Content(attachment, bytes) => {
                let disposition = format!(
                    "attachment; filename=\"{}\"",
                    attachment.file_name.replace('"', "")
                );
                (
                    [
                        (CONTENT_TYPE, attachment.content_type),
                        (CONTENT_DISPOSITION, disposition),
                    ],
                    bytes,
                )
                    .into_response()
            }
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/cases/{id}/attachments`
pub async fn list<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<AttachmentResponse, ApiError> {
    current.require(Permission::ViewCases)?;
    let attachments = state.attachments.list(parse_id(&id, "case")?).await?;
    Ok(AttachmentResponse::List(Json(attachments)))
}

/// `POST /api/cases/{id}/attachments?file_name=...`
pub async fn upload<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<AttachmentResponse, ApiError> {
    let actor = current.require(Permission::EditCases)?;
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE);
    let attachment = state
        .attachments
        .upload(
            parse_id(&id, "case")?,
            &params.file_name,
            content_type,
            body.to_vec(),
            actor,
        )
        .await?;
    Ok(AttachmentResponse::Created(Json(attachment)))
}

/// `GET /api/attachments/{id}`: the file content.
pub async fn download<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<AttachmentResponse, ApiError> {
    current.require(Permission::ViewCases)?;
    let (attachment, bytes) = state
        .attachments
        .download(parse_id(&id, "attachment")?)
        .await?;
    Ok(AttachmentResponse::Content(attachment, bytes))
}

/// `DELETE /api/attachments/{id}`
pub async fn delete<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<AttachmentResponse, ApiError> {
    let actor = current.require(Permission::EditCases)?;
    state
        .attachments
        .delete(parse_id(&id, "attachment")?, actor)
        .await?;
    Ok(AttachmentResponse::NoContent)
}
