//! Login, logout and the current session.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use mims_app::ports::Backend;
use mims_domain::time::Timestamp;
use mims_domain::user::User;

use crate::auth::{CurrentUser, clear_session_cookie, session_cookie};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body returned on login. The token is also set as a cookie.
#[derive(Serialize)]
pub struct LoginBody {
    pub user: User,
    pub token: String,
    pub expires_at: Timestamp,
}

/// Possible responses from the login endpoint.
pub enum LoginResponse {
    Ok { cookie: String, body: LoginBody },
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok { cookie, body } => ([(SET_COOKIE, cookie)], Json(body)).into_response(),
        }
    }
}

/// Possible responses from the logout endpoint.
pub enum LogoutResponse {
    NoContent { cookie: String },
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent { cookie } => {
                (StatusCode::NO_CONTENT, [(SET_COOKIE, cookie)]).into_response()
            }
        }
    }
}

/// Possible responses from the me endpoint.
pub enum MeResponse {
    Ok(Json<User>),
}

impl IntoResponse for MeResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `POST /api/auth/login`
pub async fn login<B: Backend>(
    State(state): State<AppState<B>>,
    Json(req): Json<LoginRequest>,
) -> Result<LoginResponse, ApiError> {
    let (session, user) = state.auth.login(&req.email, &req.password).await?;
    let cookie = session_cookie(
        &session.token,
        state.settings.session_ttl_secs,
        state.settings.secure_cookie,
    );
    Ok(LoginResponse::Ok {
        cookie,
        body: LoginBody {
            user,
            token: session.token.as_str().to_string(),
            expires_at: session.expires_at,
        },
    })
}

/// `POST /api/auth/logout`
pub async fn logout<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
) -> Result<LogoutResponse, ApiError> {
    state.auth.logout(&current.token).await?;
    Ok(LogoutResponse::NoContent {
        cookie: clear_session_cookie(state.settings.secure_cookie),
    })
}

/// `GET /api/auth/me`
pub async fn me(current: CurrentUser) -> MeResponse {
    MeResponse::Ok(Json(current.user))
}
