//! HTTP error response mapping.

use axum::Json;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use mims_domain::error::{AuthError, MimsError, ValidationError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`MimsError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(MimsError);

impl ApiError {
    /// Rejection for a path or query identifier that is not a UUID.
    #[must_use]
    pub fn invalid_id(kind: &'static str) -> Self {
        Self(ValidationError::InvalidIdentifier { kind }.into())
    }
}

impl From<MimsError> for ApiError {
    fn from(err: MimsError) -> Self {
        Self(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err.into())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::Unauthenticated | AuthError::InvalidCredentials | AuthError::SessionExpired => {
            StatusCode::UNAUTHORIZED
        }
        AuthError::AccountDisabled | AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            MimsError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            MimsError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            MimsError::Conflict(err) => (StatusCode::CONFLICT, err.to_string()),
            MimsError::Auth(err) => (auth_status(err), err.to_string()),
            MimsError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, self.0.to_string()),
            MimsError::Delivery(err) => {
                tracing::warn!(error = %err, "outbound delivery failed");
                (StatusCode::BAD_GATEWAY, self.0.to_string())
            }
            MimsError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let mut response = (status, Json(ErrorBody { error: message })).into_response();
        if let MimsError::RateLimited { retry_after_secs } = self.0 {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs.max(1)));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mims_domain::error::{ConflictError, NotFoundError};

    fn status_of(err: MimsError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn should_map_error_kinds_to_status_codes() {
        assert_eq!(
            status_of(ValidationError::EmptyTitle.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                NotFoundError {
                    entity: "Case",
                    id: "x".into()
                }
                .into()
            ),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ConflictError::EmailTaken("a@b.c".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AuthError::SessionExpired.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AuthError::Forbidden { permission: "x" }.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(MimsError::Delivery(
                mims_domain::error::DeliveryError::Timeout
            )),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn should_set_retry_after_when_rate_limited() {
        let response = ApiError::from(MimsError::RateLimited {
            retry_after_secs: 30,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "30");
    }

    #[test]
    fn should_hide_storage_details() {
        let response = ApiError::from(MimsError::Storage("disk on fire".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
