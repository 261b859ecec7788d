//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod attachments;
#[allow(clippy::missing_errors_doc)]
pub mod auth;
#[allow(clippy::missing_errors_doc)]
pub mod case_types;
#[allow(clippy::missing_errors_doc)]
pub mod cases;
#[allow(clippy::missing_errors_doc)]
pub mod dashboard;
#[allow(clippy::missing_errors_doc)]
pub mod line_channels;
#[allow(clippy::missing_errors_doc)]
pub mod notifications;
#[allow(clippy::missing_errors_doc)]
pub mod providers;
pub mod sse;
#[allow(clippy::missing_errors_doc)]
pub mod templates;
#[allow(clippy::missing_errors_doc)]
pub mod users;
#[allow(clippy::missing_errors_doc)]
pub mod webhooks;

use std::str::FromStr;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use serde::{Deserialize, Deserializer};

use mims_app::ports::Backend;

use crate::error::ApiError;
use crate::state::AppState;

/// Parse a path segment into a typed identifier.
pub(crate) fn parse_id<T: FromStr>(raw: &str, kind: &'static str) -> Result<T, ApiError> {
    T::from_str(raw).map_err(|_| ApiError::invalid_id(kind))
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Build the `/api` sub-router.
///
/// `upload_limit` caps raw attachment bodies, in bytes.
pub fn routes<B: Backend>(upload_limit: usize) -> Router<AppState<B>> {
    Router::new()
        // Session
        .route("/auth/login", post(auth::login::<B>))
        .route("/auth/logout", post(auth::logout::<B>))
        .route("/auth/me", get(auth::me))
        // Cases
        .route("/cases", get(cases::list::<B>).post(cases::create::<B>))
        .route(
            "/cases/{id}",
            get(cases::get::<B>)
                .patch(cases::update::<B>)
                .delete(cases::delete::<B>),
        )
        .route("/cases/{id}/status", post(cases::change_status::<B>))
        .route("/cases/{id}/assign", post(cases::assign::<B>))
        .route(
            "/cases/{id}/activities",
            get(cases::activities::<B>).post(cases::comment::<B>),
        )
        .route(
            "/cases/{id}/attachments",
            get(attachments::list::<B>)
                .post(attachments::upload::<B>)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/attachments/{id}",
            get(attachments::download::<B>).delete(attachments::delete::<B>),
        )
        .route("/dashboard/stats", get(dashboard::stats::<B>))
        // Reference data
        .route(
            "/case-types",
            get(case_types::list::<B>).post(case_types::create::<B>),
        )
        .route(
            "/case-types/{id}",
            get(case_types::get::<B>)
                .patch(case_types::update::<B>)
                .delete(case_types::delete::<B>),
        )
        .route(
            "/providers",
            get(providers::list::<B>).post(providers::create::<B>),
        )
        .route(
            "/providers/{id}",
            get(providers::get::<B>)
                .patch(providers::update::<B>)
                .delete(providers::delete::<B>),
        )
        // Accounts
        .route("/users", get(users::list::<B>).post(users::create::<B>))
        .route(
            "/users/{id}",
            get(users::get::<B>)
                .patch(users::update::<B>)
                .delete(users::delete::<B>),
        )
        .route("/users/{id}/password", post(users::change_password::<B>))
        // Integrations
        .route(
            "/webhooks",
            get(webhooks::list::<B>).post(webhooks::create::<B>),
        )
        .route(
            "/webhooks/{id}",
            get(webhooks::get::<B>)
                .patch(webhooks::update::<B>)
                .delete(webhooks::delete::<B>),
        )
        .route("/webhooks/{id}/test", post(webhooks::send_test::<B>))
        .route(
            "/webhooks/{id}/rotate-secret",
            post(webhooks::rotate_secret::<B>),
        )
        .route(
            "/line-channels",
            get(line_channels::list::<B>).post(line_channels::create::<B>),
        )
        .route(
            "/line-channels/{id}",
            get(line_channels::get::<B>)
                .patch(line_channels::update::<B>)
                .delete(line_channels::delete::<B>),
        )
        .route(
            "/notification-templates",
            get(templates::list::<B>).post(templates::create::<B>),
        )
        .route(
            "/notification-templates/{id}",
            get(templates::get::<B>)
                .patch(templates::update::<B>)
                .delete(templates::delete::<B>),
        )
        .route(
            "/notification-templates/{id}/preview",
            post(templates::preview::<B>),
        )
        // Outbox
        .route(
            "/notifications",
            get(notifications::list::<B>).post(notifications::enqueue::<B>),
        )
        .route("/notifications/process", post(notifications::process::<B>))
        .route(
            "/notifications/{id}/requeue",
            post(notifications::requeue::<B>),
        )
        // Live updates
        .route("/events/stream", get(sse::stream::<B>))
}
