//! # mims-adapter-line-reqwest
//!
//! Pushes text messages through the LINE Messaging API
//! (`POST /v2/bot/message/push`).
//!
//! ## Dependency rule
//! Depends on `mims-app` (for the [`LineMessenger`] port) and `mims-domain`.

mod config;
mod error;

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use mims_app::ports::LineMessenger;
use mims_domain::error::DeliveryError;

pub use config::LineConfig;
pub use error::LineClientError;

const PUSH_PATH: &str = "/v2/bot/message/push";

#[derive(Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

/// [`LineMessenger`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestLineMessenger {
    client: Client,
    push_url: String,
}

impl ReqwestLineMessenger {
    /// Build a messenger from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LineClientError::Build`] if the TLS backend cannot be
    /// initialised.
    pub fn new(config: &LineConfig) -> Result<Self, LineClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(LineClientError::Build)?;
        Ok(Self {
            client,
            push_url: format!("{}{PUSH_PATH}", config.api_base_url.trim_end_matches('/')),
        })
    }
}

impl LineMessenger for ReqwestLineMessenger {
    async fn push_text(
        &self,
        access_token: &str,
        target: &str,
        text: &str,
    ) -> Result<(), DeliveryError> {
        let body = PushRequest {
            to: target,
            messages: [TextMessage { kind: "text", text }],
        };
        let response = self
            .client
            .post(&self.push_url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Transport(Box::new(err))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(target, "LINE message pushed");
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        tracing::warn!(target, status = status.as_u16(), %detail, "LINE push rejected");
        Err(DeliveryError::Status(status.as_u16()))
    }
}
