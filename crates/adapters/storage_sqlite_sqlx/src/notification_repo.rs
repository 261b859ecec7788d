//! `SQLite` implementation of [`NotificationRepository`], the LINE outbox.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use mims_app::ports::NotificationRepository;
use mims_domain::error::MimsError;
use mims_domain::id::NotificationId;
use mims_domain::notification::{Notification, NotificationStatus};

use crate::codec::{opt_ts, parse, parse_opt, parse_opt_ts, parse_ts, ts};
use crate::error::StorageError;

struct Wrapper(Notification);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let channel_id: String = row.try_get("channel_id")?;
        let case_id: Option<String> = row.try_get("case_id")?;
        let template_id: Option<String> = row.try_get("template_id")?;
        let status: String = row.try_get("status")?;
        let attempts: i64 = row.try_get("attempts")?;
        let created_at: String = row.try_get("created_at")?;
        let sent_at: Option<String> = row.try_get("sent_at")?;

        Ok(Self(Notification {
            id: parse(&id)?,
            channel_id: parse(&channel_id)?,
            target: row.try_get("target")?,
            message: row.try_get("message")?,
            case_id: parse_opt(case_id)?,
            template_id: parse_opt(template_id)?,
            status: parse(&status)?,
            attempts: u32::try_from(attempts).unwrap_or_default(),
            last_error: row.try_get("last_error")?,
            created_at: parse_ts(&created_at)?,
            sent_at: parse_opt_ts(sent_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO notifications (
        id, channel_id, target, message, case_id, template_id, status, attempts,
        last_error, created_at, sent_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM notifications WHERE id = ?";
const SELECT_RECENT: &str =
    "SELECT * FROM notifications ORDER BY created_at DESC, rowid DESC LIMIT ?";
const SELECT_RECENT_BY_STATUS: &str = r"
    SELECT * FROM notifications WHERE status = ?
    ORDER BY created_at DESC, rowid DESC LIMIT ?
";
const SELECT_PENDING: &str = r"
    SELECT * FROM notifications WHERE status = 'pending'
    ORDER BY created_at, rowid LIMIT ?
";
const SAVE_OUTCOME: &str = r"
    UPDATE notifications SET status = ?, attempts = ?, last_error = ?, sent_at = ?
    WHERE id = ?
";

/// `SQLite`-backed notification outbox.
pub struct SqliteNotificationRepository {
    pool: SqlitePool,
}

impl SqliteNotificationRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl NotificationRepository for SqliteNotificationRepository {
    async fn enqueue(&self, notification: Notification) -> Result<Notification, MimsError> {
        sqlx::query(INSERT)
            .bind(notification.id.to_string())
            .bind(notification.channel_id.to_string())
            .bind(&notification.target)
            .bind(&notification.message)
            .bind(notification.case_id.map(|id| id.to_string()))
            .bind(notification.template_id.map(|id| id.to_string()))
            .bind(notification.status.as_str())
            .bind(i64::from(notification.attempts))
            .bind(&notification.last_error)
            .bind(ts(notification.created_at))
            .bind(opt_ts(notification.sent_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(notification)
    }

    async fn get_by_id(&self, id: NotificationId) -> Result<Option<Notification>, MimsError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|w| w.0))
    }

    async fn list(
        &self,
        status: Option<NotificationStatus>,
        limit: u32,
    ) -> Result<Vec<Notification>, MimsError> {
        let query = match status {
            Some(status) => sqlx::query_as::<_, Wrapper>(SELECT_RECENT_BY_STATUS).bind(status.as_str()),
            None => sqlx::query_as::<_, Wrapper>(SELECT_RECENT),
        };
        let rows: Vec<Wrapper> = query
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn pending(&self, limit: u32) -> Result<Vec<Notification>, MimsError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_PENDING)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn save_outcome(&self, notification: &Notification) -> Result<(), MimsError> {
        sqlx::query(SAVE_OUTCOME)
            .bind(notification.status.as_str())
            .bind(i64::from(notification.attempts))
            .bind(&notification.last_error)
            .bind(opt_ts(notification.sent_at))
            .bind(notification.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}
