//! Blob store error types.

use mims_domain::error::MimsError;

/// Errors specific to the filesystem blob store.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// The key would escape the root directory or is otherwise malformed.
    #[error("invalid blob key {0:?}")]
    InvalidKey(String),

    /// Reading or writing a file failed.
    #[error("blob I/O failed")]
    Io(#[from] std::io::Error),
}

impl From<BlobError> for MimsError {
    fn from(err: BlobError) -> Self {
        MimsError::Storage(Box::new(err))
    }
}
