//! Blob store port: attachment bytes.

use std::future::Future;

use mims_domain::error::MimsError;

/// Key/value store for opaque file contents.
pub trait BlobStore {
    /// Store `bytes` under `key`, replacing any previous content.
    fn put(&self, key: &str, bytes: Vec<u8>) -> impl Future<Output = Result<(), MimsError>> + Send;

    /// Read the content stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, MimsError>> + Send;

    /// Remove `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), MimsError>> + Send;
}
