//! # mims-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **JSON API** under `/api` (cases, attachments, reference data,
//!   users, webhooks, LINE channels, templates, the notification outbox)
//! - Authenticate requests from the `mims_session` cookie or a bearer token
//!   and check role permissions per route
//! - Throttle `/api` per client address
//! - Stream case events to dashboards over **Server-Sent Events**
//! - Map application results into HTTP responses
//!
//! ## Dependency rule
//! Depends on `mims-app` (for port traits and services) and `mims-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod auth;
pub mod error;
pub mod rate_limit;
pub mod router;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
