//! `SQLite` implementation of [`SessionRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use mims_app::ports::SessionRepository;
use mims_domain::error::MimsError;
use mims_domain::id::UserId;
use mims_domain::time::Timestamp;
use mims_domain::user::{Session, SessionToken};

use crate::codec::{parse, parse_ts, ts};
use crate::error::StorageError;

struct Wrapper(Session);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let token: String = row.try_get("token")?;
        let user_id: String = row.try_get("user_id")?;
        let created_at: String = row.try_get("created_at")?;
        let expires_at: String = row.try_get("expires_at")?;

        Ok(Self(Session {
            token: SessionToken::from_raw(token),
            user_id: parse(&user_id)?,
            created_at: parse_ts(&created_at)?,
            expires_at: parse_ts(&expires_at)?,
        }))
    }
}

const INSERT: &str =
    "INSERT OR REPLACE INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)";
const SELECT_BY_TOKEN: &str = "SELECT * FROM sessions WHERE token = ?";
const DELETE_BY_TOKEN: &str = "DELETE FROM sessions WHERE token = ?";
const DELETE_BY_USER: &str = "DELETE FROM sessions WHERE user_id = ?";
const DELETE_EXPIRED: &str = "DELETE FROM sessions WHERE expires_at <= ?";

/// `SQLite`-backed session store.
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SessionRepository for SqliteSessionRepository {
    async fn create(&self, session: Session) -> Result<Session, MimsError> {
        sqlx::query(INSERT)
            .bind(session.token.as_str())
            .bind(session.user_id.to_string())
            .bind(ts(session.created_at))
            .bind(ts(session.expires_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(session)
    }

    async fn get(&self, token: &SessionToken) -> Result<Option<Session>, MimsError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_TOKEN)
            .bind(token.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|w| w.0))
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), MimsError> {
        sqlx::query(DELETE_BY_TOKEN)
            .bind(token.as_str())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, MimsError> {
        let result = sqlx::query(DELETE_BY_USER)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, MimsError> {
        let result = sqlx::query(DELETE_EXPIRED)
            .bind(ts(now))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(result.rows_affected())
    }
}
