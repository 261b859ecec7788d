//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`MimsError`]
//! via `#[from]` (or an explicit `From` impl for boxed adapter errors).

use crate::case::CaseStatus;

/// Top-level error returned by services and ports.
#[derive(Debug, thiserror::Error)]
pub enum MimsError {
    /// A domain invariant was violated by caller-supplied data.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The requested record does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// The request conflicts with existing state.
    #[error("{0}")]
    Conflict(#[from] ConflictError),

    /// Authentication or authorization failed.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Too many requests for the same key within the limiter window.
    #[error("too many requests, retry in {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the caller may try again.
        retry_after_secs: u64,
    },

    /// An outbound delivery (webhook, LINE push) failed.
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// The persistence layer failed.
    #[error("storage error")]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

/// Invariant violations detected in domain objects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("title must not be empty")]
    EmptyTitle,

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("invalid {kind} identifier")]
    InvalidIdentifier { kind: &'static str },

    #[error("invalid email address")]
    InvalidEmail,

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("cannot move case from {from} to {to}")]
    InvalidTransition { from: CaseStatus, to: CaseStatus },

    #[error("case is {status} and can no longer be changed")]
    TerminalCase { status: CaseStatus },

    #[error("SLA minutes must be positive and response must not exceed resolution")]
    InvalidSla,

    #[error("url must start with http:// or https://")]
    InvalidUrl,

    #[error("secret must be at least {min} characters")]
    SecretTooShort { min: usize },

    #[error("at least one event must be selected")]
    NoEvents,

    #[error("file name must not be empty")]
    EmptyFileName,

    #[error("file must not be empty")]
    EmptyFile,

    #[error("file is {size} bytes, the limit is {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("content type {0} is not allowed")]
    UnsupportedContentType(String),

    #[error("message must not be empty")]
    EmptyMessage,

    #[error("delivery target must not be empty")]
    EmptyTarget,

    #[error("access token must not be empty")]
    EmptyAccessToken,

    #[error("only failed notifications can be re-queued")]
    NotRequeueable,
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of record (e.g. `"Case"`).
    pub entity: &'static str,
    /// The identifier that was looked up.
    pub id: String,
}

/// The request is valid on its own but clashes with stored state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("email {0} is already registered")]
    EmailTaken(String),

    #[error("{entity} named {name} already exists")]
    NameTaken { entity: &'static str, name: String },

    #[error("{entity} {id} is still referenced")]
    InUse { entity: &'static str, id: String },

    /// A unique index rejected the write.
    #[error("duplicate record: {0}")]
    Duplicate(String),
}

/// Authentication and authorization failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("session expired")]
    SessionExpired,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("missing permission {permission}")]
    Forbidden { permission: &'static str },
}

/// Outbound delivery failures reported by sender ports.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The remote did not answer within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The remote answered with a non-success status code.
    #[error("remote answered with status {0}")]
    Status(u16),

    /// Connection, TLS or protocol failure.
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DeliveryError {
    /// HTTP status reported by the remote, if it answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            Self::Timeout | Self::Transport(_) => None,
        }
    }
}
