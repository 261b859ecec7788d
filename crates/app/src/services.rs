//! Application services: use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod attachment_service;
pub mod auth_service;
pub mod case_service;
pub mod case_type_service;
pub mod event_handler;
pub mod line_channel_service;
pub mod notification_service;
pub mod provider_service;
pub mod template_service;
pub mod user_service;
pub mod webhook_dispatcher;
pub mod webhook_service;
