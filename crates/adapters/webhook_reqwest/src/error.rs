//! Webhook adapter error types.

/// Errors raised while setting up the webhook client.
#[derive(Debug, thiserror::Error)]
pub enum WebhookClientError {
    /// The reqwest client could not be built.
    #[error("failed to build HTTP client")]
    Build(#[source] reqwest::Error),
}
