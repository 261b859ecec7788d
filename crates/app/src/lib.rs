//! # mims-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - repositories for cases, reference data, users, sessions, webhooks,
//!     LINE channels, templates and the notification outbox
//!   - `EventPublisher`: fan case events out in-process
//!   - `WebhookSender`, `LineMessenger`: outbound HTTP deliveries
//!   - `BlobStore`: attachment bytes
//! - Define **driving/inbound ports** as use-case services:
//!   - `CaseService`: create, update, transition, assign, comment, stats
//!   - `AuthService`, `UserService`: sessions, accounts, passwords
//!   - `WebhookDispatcher`, `NotificationService`: deliveries and the outbox
//! - Provide **in-process infrastructure** (event bus, rate limiter) that
//!   doesn't need IO
//!
//! ## Dependency rule
//! Depends on `mims-domain` only (plus `tokio::sync` for channels and
//! `argon2` for password hashing).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod password;
pub mod ports;
pub mod rate_limiter;
pub mod services;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
