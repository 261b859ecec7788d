//! # mims-adapter-blob-fs
//!
//! Stores attachment contents as plain files below a root directory.
//! A key such as `<case-id>/<attachment-id>` maps to the file
//! `<root>/<case-id>/<attachment-id>`.
//!
//! ## Dependency rule
//! Depends on `mims-app` (for the [`BlobStore`] port) and `mims-domain`.

mod error;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use mims_app::ports::BlobStore;
use mims_domain::error::MimsError;

pub use error::BlobError;

/// [`BlobStore`] writing one file per key.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl FsBlobStore {
    /// Open the store, creating `root` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError::Io`] if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        tracing::debug!(root = %root.display(), "blob store opened");
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for `key`, rejecting keys that could leave the root.
    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        if !key.split('/').all(valid_segment) {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        // write then rename so readers never see a partial file
        let staging = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        fs::write(&staging, bytes).await?;
        if let Err(err) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        // drop the per-case directory once it is empty
        if let Some(parent) = path.parent().filter(|p| *p != self.root) {
            let _ = fs::remove_dir(parent).await;
        }
        Ok(())
    }
}

impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), MimsError> {
        Ok(self.write(key, bytes).await?)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MimsError> {
        Ok(self.read(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), MimsError> {
        Ok(self.remove(key).await?)
    }
}
