//! JSON REST handlers for cases and their timeline.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use mims_app::ports::Backend;
use mims_app::services::case_service::{CaseUpdate, NewCase};
use mims_domain::activity::CaseActivity;
use mims_domain::case::{Case, CaseQuery, CaseStatus, Page, Severity, SlaStatus};
use mims_domain::id::{CaseId, CaseTypeId, ProviderId, UserId};
use mims_domain::time::{Timestamp, now};
use mims_domain::user::Permission;

use super::{double_option, parse_id};
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

/// A case together with its SLA state at response time.
#[derive(Serialize)]
pub struct CaseView {
    #[serde(flatten)]
    pub case: Case,
    pub sla: SlaStatus,
}

impl CaseView {
    fn at(case: Case, at: Timestamp) -> Self {
        let sla = case.sla_status(at);
        Self { case, sla }
    }
}

/// Request body for creating a case.
#[derive(Deserialize)]
pub struct CreateCaseRequest {
    pub title: String,
    pub description: Option<String>,
    pub case_type_id: Option<CaseTypeId>,
    pub provider_id: Option<ProviderId>,
    pub severity: Option<Severity>,
    pub assignee_id: Option<UserId>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub location: Option<String>,
}

impl From<CreateCaseRequest> for NewCase {
    fn from(req: CreateCaseRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            case_type_id: req.case_type_id,
            provider_id: req.provider_id,
            severity: req.severity,
            assignee_id: req.assignee_id,
            contact_name: req.contact_name,
            contact_phone: req.contact_phone,
            location: req.location,
        }
    }
}

/// Request body for a partial case update. `null` clears a reference.
#[derive(Deserialize)]
pub struct UpdateCaseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub case_type_id: Option<Option<CaseTypeId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub provider_id: Option<Option<ProviderId>>,
    pub severity: Option<Severity>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub location: Option<String>,
}

impl From<UpdateCaseRequest> for CaseUpdate {
    fn from(req: UpdateCaseRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            case_type_id: req.case_type_id,
            provider_id: req.provider_id,
            severity: req.severity,
            contact_name: req.contact_name,
            contact_phone: req.contact_phone,
            location: req.location,
        }
    }
}

#[derive(Deserialize)]
pub struct ChangeStatusRequest {
    pub status: CaseStatus,
    pub note: Option<String>,
}

/// `assignee_id: null` unassigns the case.
#[derive(Deserialize)]
pub struct AssignRequest {
    pub assignee_id: Option<UserId>,
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Page<CaseView>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Responses carrying a single case.
pub enum CaseResponse {
    Ok(Json<CaseView>),
    Created(Json<CaseView>),
}

impl IntoResponse for CaseResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the activity endpoints.
pub enum ActivityResponse {
    List(Json<Vec<CaseActivity>>),
    Created(Json<CaseActivity>),
}

impl IntoResponse for ActivityResponse {
    fn into_response(self) -> Response {
        match self {
            Self::List(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/cases`
pub async fn list<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Query(query): Query<CaseQuery>,
) -> Result<ListResponse, ApiError> {
    current.require(Permission::ViewCases)?;
    let page = state.cases.list_cases(&query).await?;
    let at = now();
    Ok(ListResponse::Ok(Json(Page {
        items: page
            .items
            .into_iter()
            .map(|case| CaseView::at(case, at))
            .collect(),
        total: page.total,
        limit: page.limit,
        offset: page.offset,
    })))
}

/// `POST /api/cases`
pub async fn create<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Json(req): Json<CreateCaseRequest>,
) -> Result<CaseResponse, ApiError> {
    let actor = current.require(Permission::EditCases)?;
    let case = state.cases.create_case(req.into(), actor).await?;
    Ok(CaseResponse::Created(Json(CaseView::at(case, now()))))
}

/// `GET /api/cases/{id}`
pub async fn get<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<CaseResponse, ApiError> {
    current.require(Permission::ViewCases)?;
    let case = state.cases.get_case(parse_id(&id, "case")?).await?;
    Ok(CaseResponse::Ok(Json(CaseView::at(case, now()))))
}

/// `PATCH /api/cases/{id}`
pub async fn update<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateCaseRequest>,
) -> Result<CaseResponse, ApiError> {
    let actor = current.require(Permission::EditCases)?;
    let case = state
        .cases
        .update_case(parse_id(&id, "case")?, req.into(), actor)
        .await?;
    Ok(CaseResponse::Ok(Json(CaseView::at(case, now()))))
}

/// `DELETE /api/cases/{id}`
///
/// Attachment content is removed before the case row.
pub async fn delete<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<DeleteResponse, ApiError> {
    let actor = current.require(Permission::DeleteCases)?;
    let case_id: CaseId = parse_id(&id, "case")?;
    state.cases.get_case(case_id).await?;
    let removed = state.attachments.delete_for_case(case_id).await?;
    state.cases.delete_case(case_id, actor).await?;
    tracing::info!(%case_id, attachments = removed, "case deleted");
    Ok(DeleteResponse::NoContent)
}

/// `POST /api/cases/{id}/status`
pub async fn change_status<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<CaseResponse, ApiError> {
    let actor = current.require(Permission::EditCases)?;
    let case = state
        .cases
        .change_status(parse_id(&id, "case")?, req.status, req.note, actor)
        .await?;
    Ok(CaseResponse::Ok(Json(CaseView::at(case, now()))))
}

/// `POST /api/cases/{id}/assign`
pub async fn assign<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<CaseResponse, ApiError> {
    let actor = current.require(Permission::AssignCases)?;
    let case = state
        .cases
        .assign(parse_id(&id, "case")?, req.assignee_id, actor)
        .await?;
    Ok(CaseResponse::Ok(Json(CaseView::at(case, now()))))
}

/// `GET /api/cases/{id}/activities`
pub async fn activities<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<ActivityResponse, ApiError> {
    current.require(Permission::ViewCases)?;
    let activities = state
        .cases
        .list_activities(parse_id(&id, "case")?)
        .await?;
    Ok(ActivityResponse::List(Json(activities)))
}

/// `POST /api/cases/{id}/activities`
pub async fn comment<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<ActivityResponse, ApiError> {
    let actor = current.require(Permission::EditCases)?;
    let activity = state
        .cases
        .add_comment(parse_id(&id, "case")?, &req.text, actor)
        .await?;
    Ok(ActivityResponse::Created(Json(activity)))
}
