//! JSON REST handlers for notification templates.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use mims_app::ports::Backend;
use mims_domain::event::EventKind;
use mims_domain::id::{CaseId, LineChannelId, TemplateId};
use mims_domain::template::{CaseNames, NotificationTemplate};
use mims_domain::user::Permission;

use super::parse_id;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub event: EventKind,
    pub channel_id: LineChannelId,
    pub body: String,
    pub active: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub event: Option<EventKind>,
    pub channel_id: Option<LineChannelId>,
    pub body: Option<String>,
    pub active: Option<bool>,
}

impl UpdateTemplateRequest {
    fn apply(self, template: &mut NotificationTemplate) {
        if let Some(name) = self.name {
            template.name = name.trim().to_string();
        }
        if let Some(event) = self.event {
            template.event = event;
        }
        if let Some(channel_id) = self.channel_id {
            template.channel_id = channel_id;
        }
        if let Some(body) = self.body {
            template.body = body;
        }
        if let Some(active) = self.active {
            template.active = active;
        }
    }
}

/// Render against this case, or against sample values when absent.
#[derive(Default, Deserialize)]
pub struct PreviewRequest {
    pub case_id: Option<CaseId>,
}

#[derive(Serialize)]
pub struct PreviewBody {
    pub text: String,
}

/// Possible responses from the template endpoints.
pub enum TemplateResponse {
    List(Json<Vec<NotificationTemplate>>),
    Ok(Json<NotificationTemplate>),
    Created(Json<NotificationTemplate>),
    Preview(Json<PreviewBody>),
    NoContent,
}

impl IntoResponse for TemplateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::List(json) => json.into_response(),
            Self::Ok(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::Preview(json) => json.into_response(),
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/notification-templates`
pub async fn list<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
) -> Result<TemplateResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let templates = state.templates.list_templates().await?;
    Ok(TemplateResponse::List(Json(templates)))
}

/// `POST /api/notification-templates`
pub async fn create<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Json(req): Json<CreateTemplateRequest>,
) -> Result<TemplateResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let template = NotificationTemplate::builder()
        .name(req.name)
        .event(req.event)
        .channel_id(req.channel_id)
        .body(req.body)
        .active(req.active.unwrap_or(true))
        .build()?;
    let template = state.templates.create_template(template).await?;
    Ok(TemplateResponse::Created(Json(template)))
}

/// `GET /api/notification-templates/{id}`
pub async fn get<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<TemplateResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let template = state
        .templates
        .get_template(parse_id(&id, "template")?)
        .await?;
    Ok(TemplateResponse::Ok(Json(template)))
}

/// `PATCH /api/notification-templates/{id}`
pub async fn update<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateTemplateRequest>,
) -> Result<TemplateResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let id: TemplateId = parse_id(&id, "template")?;
    let mut template = state.templates.get_template(id).await?;
    req.apply(&mut template);
    let template = state.templates.update_template(template).await?;
    Ok(TemplateResponse::Ok(Json(template)))
}

/// `DELETE /api/notification-templates/{id}`
pub async fn delete<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<TemplateResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    state
        .templates
        .delete_template(parse_id(&id, "template")?)
        .await?;
    Ok(TemplateResponse::NoContent)
}

/// `POST /api/notification-templates/{id}/preview`
pub async fn preview<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
    body: Option<Json<PreviewRequest>>,
) -> Result<TemplateResponse, ApiError> {
    let actor = current.require(Permission::ManageSettings)?;
    let id: TemplateId = parse_id(&id, "template")?;
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let case = match req.case_id {
        Some(case_id) => Some(state.cases.get_case(case_id).await?),
        None => None,
    };
    let assignee = match case.as_ref().and_then(|c| c.assignee_id) {
        Some(user_id) => Some(state.users.get_user(user_id).await?.display_name),
        None => None,
    };
    let case_type = match case.as_ref().and_then(|c| c.case_type_id) {
        Some(type_id) => Some(state.case_types.get_case_type(type_id).await?.name),
        None => None,
    };

    let text = state
        .templates
        .preview(
            id,
            case.as_ref(),
            CaseNames {
                assignee: assignee.as_deref(),
                case_type: case_type.as_deref(),
                actor: Some(&actor.display_name),
            },
        )
        .await?;
    Ok(TemplateResponse::Preview(Json(PreviewBody { text })))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{TestApp, request, send};
    use axum::http::StatusCode;
    use mims_domain::user::Role;
    use serde_json::{Value, json};

    async fn channel_and_template(app: &TestApp, token: &str, body: &str) -> Value {
        let (_, _, channel) = send(
            app.router(),
            request(
                "POST",
                "/api/line-channels",
                Some(token),
                Some(json!({"name": "Ops", "access_token": "t", "default_target": "Cgroup"})),
            ),
        )
        .await;
        let (status, _, template) = send(
            app.router(),
            request(
                "POST",
                "/api/notification-templates",
                Some(token),
                Some(json!({
                    "name": "New case",
                    "event": "case.created",
                    "channel_id": channel["id"],
                    "body": body
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        template
    }

    #[tokio::test]
    async fn should_preview_with_sample_values() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Admin).await;
        let template = channel_and_template(&app, &token, "[{{ case.severity }}] {{ case.title }}").await;
        let uri = format!(
            "/api/notification-templates/{}/preview",
            template["id"].as_str().unwrap()
        );

        let (status, _, body) = send(app.router(), request("POST", &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "[high] Air conditioner leaking");
    }

    #[tokio::test]
    async fn should_preview_against_real_case() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Admin).await;
        let template =
            channel_and_template(&app, &token, "{{ case.title }} by {{ actor }}").await;
        let (_, _, case) = send(
            app.router(),
            request("POST", "/api/cases", Some(&token), Some(json!({"title": "Lift stuck"}))),
        )
        .await;
        let uri = format!(
            "/api/notification-templates/{}/preview",
            template["id"].as_str().unwrap()
        );

        let (status, _, body) = send(
            app.router(),
            request("POST", &uri, Some(&token), Some(json!({"case_id": case["id"]}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "Lift stuck by admin user");
    }

    #[tokio::test]
    async fn should_return_404_for_unknown_channel() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Admin).await;
        let (status, _, _) = send(
            app.router(),
            request(
                "POST",
                "/api/notification-templates",
                Some(&token),
                Some(json!({
                    "name": "x",
                    "event": "case.created",
                    "channel_id": mims_domain::id::LineChannelId::new(),
                    "body": "hi"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
