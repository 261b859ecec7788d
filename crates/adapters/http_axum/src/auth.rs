//! Session authentication for API handlers.
//!
//! A request is authenticated by the `mims_session` cookie set at login, or by
//! an `Authorization: Bearer <token>` header carrying the same token.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;

use mims_app::ports::Backend;
use mims_domain::error::AuthError;
use mims_domain::user::{Permission, SessionToken, User};

use crate::error::ApiError;
use crate::state::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "mims_session";

/// Session token carried by the request, bearer header first.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<SessionToken> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(SessionToken::from_raw(token));
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| SessionToken::from_raw(value))
        })
}

/// `Set-Cookie` value opening a session.
#[must_use]
pub fn session_cookie(token: &SessionToken, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}",
        token.as_str()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value removing the session cookie.
#[must_use]
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie(&SessionToken::from_raw(""), 0, secure)
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: SessionToken,
}

impl CurrentUser {
    /// The caller, provided their role grants `permission`.
    ///
    /// # Errors
    ///
    /// Returns a 403 [`ApiError`] otherwise.
    pub fn require(&self, permission: Permission) -> Result<&User, ApiError> {
        self.user.require(permission)?;
        Ok(&self.user)
    }
}

/// Resolve the caller from the request headers.
///
/// # Errors
///
/// Returns a 401 [`ApiError`] without a valid session, or a 403 one for a
/// disabled account.
pub async fn authenticate<B: Backend>(
    state: &AppState<B>,
    headers: &HeaderMap,
) -> Result<CurrentUser, ApiError> {
    let token = session_token(headers).ok_or(AuthError::Unauthenticated)?;
    let user = state.auth.authenticate(&token).await?;
    Ok(CurrentUser { user, token })
}

impl<B: Backend> FromRequestParts<AppState<B>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<B>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(state, &parts.headers).await
    }
}
