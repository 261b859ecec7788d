//! Axum router assembly.

use axum::Router;
use axum::middleware;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use mims_app::ports::Backend;

use crate::rate_limit::limit_requests;
use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// API routes live under `/api` behind the per-client rate limiter.
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build<B: Backend>(state: AppState<B>) -> Router {
    let upload_limit = usize::try_from(state.attachments.max_bytes()).unwrap_or(usize::MAX);
    let api = crate::api::routes::<B>(upload_limit).layer(middleware::from_fn_with_state(
        state.clone(),
        limit_requests::<B>,
    ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
