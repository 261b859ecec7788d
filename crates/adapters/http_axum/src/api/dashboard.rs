//! Dashboard figures.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};

use mims_app::ports::Backend;
use mims_app::services::case_service::DashboardStats;
use mims_domain::user::Permission;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the stats endpoint.
pub enum StatsResponse {
    Ok(Json<DashboardStats>),
}

impl IntoResponse for StatsResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/dashboard/stats`
pub async fn stats<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
) -> Result<StatsResponse, ApiError> {
    current.require(Permission::ViewCases)?;
    let stats = state.cases.dashboard_stats().await?;
    Ok(StatsResponse::Ok(Json(stats)))
}
