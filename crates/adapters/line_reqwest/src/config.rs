//! LINE client configuration.

use serde::Deserialize;

/// Configuration for the LINE Messaging API client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// API origin, without a trailing slash.
    pub api_base_url: String,
    /// Seconds to wait for the API before giving up.
    pub timeout_secs: u64,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.line.me".to_string(),
            timeout_secs: 10,
        }
    }
}
