//! Attachment: a file uploaded to a case.

use serde::{Deserialize, Serialize};

use crate::error::{MimsError, ValidationError};
use crate::id::{AttachmentId, CaseId, UserId};
use crate::time::{Timestamp, now};

/// Default upload limit (10 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

const MAX_FILE_NAME_CHARS: usize = 255;

/// Content types accepted for upload.
const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
    "text/csv",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/zip",
];

/// Metadata of a stored file. The bytes live in a blob store under
/// [`storage_key`](Self::storage_key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub case_id: CaseId,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub storage_key: String,
    pub uploaded_by: Option<UserId>,
    pub created_at: Timestamp,
}

/// Strip directory components and control characters from a client-supplied name.
#[must_use]
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    base.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .trim_start_matches('.')
        .to_string()
}

/// Lower-case a content type and drop parameters (`; charset=...`).
#[must_use]
pub fn normalize_content_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

impl Attachment {
    /// Validate an upload and describe where it will be stored.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] for an empty or oversized file, a
    /// blank file name or a content type outside the allow-list.
    pub fn new(
        case_id: CaseId,
        file_name: &str,
        content_type: &str,
        size_bytes: u64,
        max_bytes: u64,
        uploaded_by: Option<UserId>,
    ) -> Result<Self, MimsError> {
        let file_name = sanitize_file_name(file_name);
        if file_name.is_empty() {
            return Err(ValidationError::EmptyFileName.into());
        }
        if file_name.chars().count() > MAX_FILE_NAME_CHARS {
            return Err(ValidationError::TooLong {
                field: "file_name",
                max: MAX_FILE_NAME_CHARS,
            }
            .into());
        }
        if size_bytes == 0 {
            return Err(ValidationError::EmptyFile.into());
        }
        if size_bytes > max_bytes {
            return Err(ValidationError::FileTooLarge {
                size: size_bytes,
                max: max_bytes,
            }
            .into());
        }
        let content_type = normalize_content_type(content_type);
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(ValidationError::UnsupportedContentType(content_type).into());
        }

        let id = AttachmentId::new();
        Ok(Self {
            id,
            case_id,
            file_name,
            content_type,
            size_bytes,
            storage_key: format!("{case_id}/{id}"),
            uploaded_by,
            created_at: now(),
        })
    }
}
