//! Per-client request throttling for the API.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use mims_app::ports::Backend;

use crate::error::ApiError;
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Key identifying the client: first `X-Forwarded-For` hop, else the peer IP.
fn client_key(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(forwarded) = forwarded {
        return forwarded.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}

/// Middleware rejecting clients above the configured request rate with 429.
///
/// # Errors
///
/// Returns [`ApiError`] wrapping `MimsError::RateLimited`.
pub async fn limit_requests<B: Backend>(
    State(state): State<AppState<B>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&request);
    if let Err(err) = state.rate_limiter.check(&key) {
        tracing::warn!(client = %key, path = %request.uri().path(), "request rate limited");
        return Err(err.into());
    }
    Ok(next.run(request).await)
}
