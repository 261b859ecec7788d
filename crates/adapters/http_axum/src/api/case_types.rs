//! JSON REST handlers for case types.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use mims_app::ports::Backend;
use mims_domain::case::Severity;
use mims_domain::case_type::CaseType;
use mims_domain::id::CaseTypeId;
use mims_domain::user::Permission;

use super::{double_option, parse_id};
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateCaseTypeRequest {
    pub name: String,
    pub description: Option<String>,
    pub default_severity: Option<Severity>,
    pub response_sla_minutes: Option<u32>,
    pub resolution_sla_minutes: Option<u32>,
    pub active: Option<bool>,
}

/// Partial update. `null` SLA minutes fall back to the severity defaults.
#[derive(Deserialize)]
pub struct UpdateCaseTypeRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub default_severity: Option<Severity>,
    #[serde(default, deserialize_with = "double_option")]
    pub response_sla_minutes: Option<Option<u32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub resolution_sla_minutes: Option<Option<u32>>,
    pub active: Option<bool>,
}

impl UpdateCaseTypeRequest {
    fn apply(self, case_type: &mut CaseType) {
        if let Some(name) = self.name {
            case_type.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            case_type.description = description.filter(|d| !d.trim().is_empty());
        }
        if let Some(severity) = self.default_severity {
            case_type.default_severity = severity;
        }
        if let Some(minutes) = self.response_sla_minutes {
            case_type.response_sla_minutes = minutes;
        }
        if let Some(minutes) = self.resolution_sla_minutes {
            case_type.resolution_sla_minutes = minutes;
        }
        if let Some(active) = self.active {
            case_type.active = active;
        }
    }
}

/// Possible responses from the case type endpoints.
pub enum CaseTypeResponse {
    List(Json<Vec<CaseType>>),
    Ok(Json<CaseType>),
    Created(Json<CaseType>),
    NoContent,
}

impl IntoResponse for CaseTypeResponse {
    fn into_response(self) -> Response {
        match self {
            Self::List(json) => json.into_response(),
            Self::Ok(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/case-types`
pub async fn list<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
) -> Result<CaseTypeResponse, ApiError> {
    current.require(Permission::ViewCases)?;
    let case_types = state.case_types.list_case_types().await?;
    Ok(CaseTypeResponse::List(Json(case_types)))
}

/// `POST /api/case-types`
pub async fn create<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Json(req): Json<CreateCaseTypeRequest>,
) -> Result<CaseTypeResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let mut builder = CaseType::builder()
        .name(req.name)
        .default_severity(req.default_severity.unwrap_or_default())
        .active(req.active.unwrap_or(true));
    if let Some(description) = req.description {
        builder = builder.description(description);
    }
    if let Some(minutes) = req.response_sla_minutes {
        builder = builder.response_sla_minutes(minutes);
    }
    if let Some(minutes) = req.resolution_sla_minutes {
        builder = builder.resolution_sla_minutes(minutes);
    }
    let case_type = state.case_types.create_case_type(builder.build()?).await?;
    Ok(CaseTypeResponse::Created(Json(case_type)))
}

/// `GET /api/case-types/{id}`
pub async fn get<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<CaseTypeResponse, ApiError> {
    current.require(Permission::ViewCases)?;
    let case_type = state
        .case_types
        .get_case_type(parse_id(&id, "case type")?)
        .await?;
    Ok(CaseTypeResponse::Ok(Json(case_type)))
}

/// `PATCH /api/case-types/{id}`
pub async fn update<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateCaseTypeRequest>,
) -> Result<CaseTypeResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let id: CaseTypeId = parse_id(&id, "case type")?;
    let mut case_type = state.case_types.get_case_type(id).await?;
    req.apply(&mut case_type);
    let case_type = state.case_types.update_case_type(case_type).await?;
    Ok(CaseTypeResponse::Ok(Json(case_type)))
}

/// `DELETE /api/case-types/{id}`
pub async fn delete<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<CaseTypeResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    state
        .case_types
        .delete_case_type(parse_id(&id, "case type")?)
        .await?;
    Ok(CaseTypeResponse::NoContent)
}

#[cfg(test)]
mod tests {
    use crate::test_support::{TestApp, request, send};
    use axum::http::StatusCode;
    use mims_domain::user::Role;
    use serde_json::json;

    #[tokio::test]
    async fn should_create_and_patch_case_type() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Admin).await;

        let (status, _, created) = send(
            app.router(),
            request(
                "POST",
                "/api/case-types",
                Some(&token),
                Some(json!({"name": "Power outage", "default_severity": "critical", "response_sla_minutes": 15})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["default_severity"], "critical");

        let uri = format!("/api/case-types/{}", created["id"].as_str().unwrap());
        let (status, _, patched) = send(
            app.router(),
            request(
                "PATCH",
                &uri,
                Some(&token),
                Some(json!({"response_sla_minutes": null, "active": false})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(patched["response_sla_minutes"].is_null());
        assert_eq!(patched["active"], false);
        assert_eq!(patched["name"], "Power outage");
    }

    #[tokio::test]
    async fn should_reject_inverted_sla() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Admin).await;
        let (status, _, _) = send(
            app.router(),
            request(
                "POST",
                "/api/case-types",
                Some(&token),
                Some(json!({"name": "Odd", "response_sla_minutes": 90, "resolution_sla_minutes": 30})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_let_agent_read_but_not_write() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Agent).await;
        let (status, _, _) = send(app.router(), request("GET", "/api/case-types", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = send(
            app.router(),
            request("POST", "/api/case-types", Some(&token), Some(json!({"name": "x"}))),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn should_return_409_when_deleting_type_in_use() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Admin).await;
        let (_, _, created) = send(
            app.router(),
            request("POST", "/api/case-types", Some(&token), Some(json!({"name": "Network"}))),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();
        send(
            app.router(),
            request(
                "POST",
                "/api/cases",
                Some(&token),
                Some(json!({"title": "Router down", "case_type_id": id})),
            ),
        )
        .await;

        let (status, _, _) = send(
            app.router(),
            request("DELETE", &format!("/api/case-types/{id}"), Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
