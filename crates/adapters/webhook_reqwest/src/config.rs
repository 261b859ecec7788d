//! Webhook client configuration.

use serde::Deserialize;

/// Configuration for outbound webhook delivery.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookClientConfig {
    /// Seconds to wait for a receiver before giving up.
    pub timeout_secs: u64,
}

impl Default for WebhookClientConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}
