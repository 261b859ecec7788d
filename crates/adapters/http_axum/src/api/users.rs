//! JSON REST handlers for user accounts.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use mims_app::ports::Backend;
use mims_app::services::user_service::{NewUser, UserUpdate};
use mims_domain::id::UserId;
use mims_domain::user::{Permission, Role, User};

use super::parse_id;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    pub password: String,
    pub line_user_id: Option<String>,
}

/// Partial update. An empty `line_user_id` clears it.
#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub line_user_id: Option<String>,
}

/// `current_password` is required when changing one's own password.
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: String,
}

/// Possible responses from the user endpoints.
pub enum UserResponse {
    List(Json<Vec<User>>),
    Ok(Json<User>),
    Created(Json<User>),
    NoContent,
}

impl IntoResponse for UserResponse {
    fn into_response(self) -> Response {
        match self {
            Self::List(json) => json.into_response(),
            Self::Ok(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/users`
pub async fn list<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
) -> Result<UserResponse, ApiError> {
    current.require(Permission::ManageUsers)?;
    let users = state.users.list_users().await?;
    Ok(UserResponse::List(Json(users)))
}

/// `POST /api/users`
pub async fn create<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<UserResponse, ApiError> {
    current.require(Permission::ManageUsers)?;
    let user = state
        .users
        .create_user(NewUser {
            email: req.email,
            display_name: req.display_name,
            role: req.role,
            password: req.password,
            line_user_id: req.line_user_id,
        })
        .await?;
    Ok(UserResponse::Created(Json(user)))
}

/// `GET /api/users/{id}`: any user may read their own account.
pub async fn get<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<UserResponse, ApiError> {
    let id: UserId = parse_id(&id, "user")?;
    if id != current.user.id {
        current.require(Permission::ManageUsers)?;
    }
    let user = state.users.get_user(id).await?;
    Ok(UserResponse::Ok(Json(user)))
}

/// `PATCH /api/users/{id}`
pub async fn update<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<UserResponse, ApiError> {
    current.require(Permission::ManageUsers)?;
    let user = state
        .users
        .update_user(
            parse_id(&id, "user")?,
            UserUpdate {
                display_name: req.display_name,
                role: req.role,
                active: req.active,
                line_user_id: req.line_user_id,
            },
        )
        .await?;
    Ok(UserResponse::Ok(Json(user)))
}

/// `DELETE /api/users/{id}`
pub async fn delete<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<UserResponse, ApiError> {
    current.require(Permission::ManageUsers)?;
    state.users.delete_user(parse_id(&id, "user")?).await?;
    Ok(UserResponse::NoContent)
}

/// `POST /api/users/{id}/password`
///
/// Changing one's own password checks the current one; resetting someone
/// else's requires `manage_users` and revokes their sessions.
pub async fn change_password<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<UserResponse, ApiError> {
    let id: UserId = parse_id(&id, "user")?;
    let current_password = if id == current.user.id {
        Some(req.current_password.unwrap_or_default())
    } else {
        current.require(Permission::ManageUsers)?;
        None
    };
    state
        .users
        .change_password(id, current_password.as_deref(), &req.new_password)
        .await?;
    Ok(UserResponse::NoContent)
}
