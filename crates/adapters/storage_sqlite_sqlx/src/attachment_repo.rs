//! `SQLite` implementation of [`AttachmentRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use mims_app::ports::AttachmentRepository;
use mims_domain::attachment::Attachment;
use mims_domain::error::MimsError;
use mims_domain::id::{AttachmentId, CaseId};

use crate::codec::{int, parse, parse_opt, parse_ts, ts, uint};
use crate::error::StorageError;

struct Wrapper(Attachment);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Attachment> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let case_id: String = row.try_get("case_id")?;
        let size_bytes: i64 = row.try_get("size_bytes")?;
        let uploaded_by: Option<String> = row.try_get("uploaded_by")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Self(Attachment {
            id: parse(&id)?,
            case_id: parse(&case_id)?,
            file_name: row.try_get("file_name")?,
            content_type: row.try_get("content_type")?,
            size_bytes: uint(size_bytes),
            storage_key: row.try_get("storage_key")?,
            uploaded_by: parse_opt(uploaded_by)?,
            created_at: parse_ts(&created_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO attachments (
        id, case_id, file_name, content_type, size_bytes, storage_key, uploaded_by, created_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM attachments WHERE id = ?";
const SELECT_BY_CASE: &str = "SELECT * FROM attachments WHERE case_id = ? ORDER BY created_at ASC";
const DELETE_BY_ID: &str = "DELETE FROM attachments WHERE id = ?";

/// `SQLite`-backed attachment metadata repository.
pub struct SqliteAttachmentRepository {
    pool: SqlitePool,
}

impl SqliteAttachmentRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AttachmentRepository for SqliteAttachmentRepository {
    async fn create(&self, attachment: Attachment) -> Result<Attachment, MimsError> {
        sqlx::query(INSERT)
            .bind(attachment.id.to_string())
            .bind(attachment.case_id.to_string())
            .bind(&attachment.file_name)
            .bind(&attachment.content_type)
            .bind(int(attachment.size_bytes))
            .bind(&attachment.storage_key)
            .bind(attachment.uploaded_by.map(|id| id.to_string()))
            .bind(ts(attachment.created_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(attachment)
    }

    async fn get_by_id(&self, id: AttachmentId) -> Result<Option<Attachment>, MimsError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn list_for_case(&self, case_id: CaseId) -> Result<Vec<Attachment>, MimsError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_CASE)
            .bind(case_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn delete(&self, id: AttachmentId) -> Result<(), MimsError> {
        sqlx::query(DELETE_BY_ID)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}
