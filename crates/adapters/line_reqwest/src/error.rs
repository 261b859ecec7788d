//! LINE adapter error types.

/// Errors raised while setting up the LINE client.
#[derive(Debug, thiserror::Error)]
pub enum LineClientError {
    /// The reqwest client could not be built.
    #[error("failed to build HTTP client")]
    Build(#[source] reqwest::Error),
}
