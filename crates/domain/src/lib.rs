//! # mims-domain
//!
//! Pure domain model for the mims case tracking back office.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Cases** (support issues with status, severity and SLA deadlines)
//!   and the status transition rules that govern them
//! - Define **Case types**, **Providers**, **Activities** and **Attachments**
//! - Define **Users**, roles, permissions and sessions
//! - Define **Webhooks** (including payload signing), **LINE channels**,
//!   **Notification templates** and **Notifications** (outbox rows)
//! - Define **Case events** published after every case mutation
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod activity;
pub mod attachment;
pub mod case;
pub mod case_type;
pub mod event;
pub mod line_channel;
pub mod notification;
pub mod provider;
pub mod template;
pub mod user;
pub mod webhook;

mod validate;
