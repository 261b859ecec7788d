//! JSON REST handlers for LINE channels. Access tokens are write-only.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use mims_app::ports::Backend;
use mims_domain::id::LineChannelId;
use mims_domain::line_channel::LineChannel;
use mims_domain::user::Permission;

use super::{double_option, parse_id};
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    pub access_token: String,
    pub default_target: Option<String>,
    pub active: Option<bool>,
}

/// Partial update. The stored token is kept unless a new one is given.
#[derive(Deserialize)]
pub struct UpdateChannelRequest {
    pub name: Option<String>,
    pub access_token: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub default_target: Option<Option<String>>,
    pub active: Option<bool>,
}

impl UpdateChannelRequest {
    fn apply(self, channel: &mut LineChannel) {
        if let Some(name) = self.name {
            channel.name = name.trim().to_string();
        }
        if let Some(token) = self.access_token {
            channel.access_token = token.trim().to_string();
        }
        if let Some(target) = self.default_target {
            channel.default_target = target
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
        }
        if let Some(active) = self.active {
            channel.active = active;
        }
    }
}

/// Possible responses from the channel endpoints.
pub enum ChannelResponse {
    List(Json<Vec<LineChannel>>),
    Ok(Json<LineChannel>),
    Created(Json<LineChannel>),
    NoContent,
}

impl IntoResponse for ChannelResponse {
    fn into_response(self) -> Response {
        match self {
            Self::List(json) => json.into_response(),
            Self::Ok(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/line-channels`
pub async fn list<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
) -> Result<ChannelResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let channels = state.line_channels.list_channels().await?;
    Ok(ChannelResponse::List(Json(channels)))
}

/// `POST /api/line-channels`
pub async fn create<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Json(req): Json<CreateChannelRequest>,
) -> Result<ChannelResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let mut builder = LineChannel::builder()
        .name(req.name)
        .access_token(req.access_token)
        .active(req.active.unwrap_or(true));
    if let Some(target) = req.default_target {
        builder = builder.default_target(target);
    }
    let channel = state.line_channels.create_channel(builder.build()?).await?;
    Ok(ChannelResponse::Created(Json(channel)))
}

/// `GET /api/line-channels/{id}`
pub async fn get<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<ChannelResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let channel = state
        .line_channels
        .get_channel(parse_id(&id, "LINE channel")?)
        .await?;
    Ok(ChannelResponse::Ok(Json(channel)))
}

/// `PATCH /api/line-channels/{id}`
pub async fn update<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateChannelRequest>,
) -> Result<ChannelResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let id: LineChannelId = parse_id(&id, "LINE channel")?;
    let mut channel = state.line_channels.get_channel(id).await?;
    req.apply(&mut channel);
    let channel = state.line_channels.update_channel(channel).await?;
    Ok(ChannelResponse::Ok(Json(channel)))
}

/// `DELETE /api/line-channels/{id}`
pub async fn delete<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<ChannelResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    state
        .line_channels
        .delete_channel(parse_id(&id, "LINE channel")?)
        .await?;
    Ok(ChannelResponse::NoContent)
}

#[cfg(test)]
mod tests {
    use crate::test_support::{TestApp, request, send};
    use axum::http::StatusCode;
    use mims_domain::user::Role;
    use serde_json::json;

    #[tokio::test]
    async fn should_never_return_access_token() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Admin).await;
        let (status, _, created) = send(
            app.router(),
            request(
                "POST",
                "/api/line-channels",
                Some(&token),
                Some(json!({"name": "Ops", "access_token": "secret-token", "default_target": "Cgroup"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(created.get("access_token").is_none());
        assert_eq!(created["default_target"], "Cgroup");

        let (_, _, listed) = send(app.router(), request("GET", "/api/line-channels", Some(&token), None)).await;
        assert!(listed[0].get("access_token").is_none());
    }

    #[tokio::test]
    async fn should_keep_token_when_patch_omits_it() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Admin).await;
        let (_, _, created) = send(
            app.router(),
            request(
                "POST",
                "/api/line-channels",
                Some(&token),
                Some(json!({"name": "Ops", "access_token": "secret-token"})),
            ),
        )
        .await;
        let uri = format!("/api/line-channels/{}", created["id"].as_str().unwrap());

        let (status, _, patched) = send(
            app.router(),
            request("PATCH", &uri, Some(&token), Some(json!({"name": "Field ops"}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patched["name"], "Field ops");

        let (status, _, _) = send(
            app.router(),
            request("PATCH", &uri, Some(&token), Some(json!({"access_token": "  "}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_refuse_delete_while_template_uses_channel() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Admin).await;
        let (_, _, channel) = send(
            app.router(),
            request(
                "POST",
                "/api/line-channels",
                Some(&token),
                Some(json!({"name": "Ops", "access_token": "t"})),
            ),
        )
        .await;
        let id = channel["id"].as_str().unwrap().to_string();
        send(
            app.router(),
            request(
                "POST",
                "/api/notification-templates",
                Some(&token),
                Some(json!({"name": "New", "event": "case.created", "channel_id": id, "body": "{{ case.title }}"})),
            ),
        )
        .await;

        let (status, _, _) = send(
            app.router(),
            request("DELETE", &format!("/api/line-channels/{id}"), Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
