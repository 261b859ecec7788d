//! `SQLite` implementation of [`LineChannelRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use mims_app::ports::LineChannelRepository;
use mims_domain::error::MimsError;
use mims_domain::id::LineChannelId;
use mims_domain::line_channel::LineChannel;

use crate::codec::{parse, parse_ts, ts};
use crate::error::StorageError;

struct Wrapper(LineChannel);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Self(LineChannel {
            id: parse(&id)?,
            name: row.try_get("name")?,
            access_token: row.try_get("access_token")?,
            default_target: row.try_get("default_target")?,
            active: row.try_get("active")?,
            created_at: parse_ts(&created_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO line_channels (id, name, access_token, default_target, active, created_at)
    VALUES (?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM line_channels WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM line_channels ORDER BY name COLLATE NOCASE";
const UPDATE: &str = r"
    UPDATE line_channels SET name = ?, access_token = ?, default_target = ?, active = ?
    WHERE id = ?
";
const DELETE_BY_ID: &str = "DELETE FROM line_channels WHERE id = ?";

/// `SQLite`-backed LINE channel repository.
pub struct SqliteLineChannelRepository {
    pool: SqlitePool,
}

impl SqliteLineChannelRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl LineChannelRepository for SqliteLineChannelRepository {
    async fn create(&self, channel: LineChannel) -> Result<LineChannel, MimsError> {
        sqlx::query(INSERT)
            .bind(channel.id.to_string())
            .bind(&channel.name)
            .bind(&channel.access_token)
            .bind(&channel.default_target)
            .bind(channel.active)
            .bind(ts(channel.created_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(channel)
    }

    async fn get_by_id(&self, id: LineChannelId) -> Result<Option<LineChannel>, MimsError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|w| w.0))
    }

    async fn get_all(&self) -> Result<Vec<LineChannel>, MimsError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, channel: LineChannel) -> Result<LineChannel, MimsError> {
        sqlx::query(UPDATE)
            .bind(&channel.name)
            .bind(&channel.access_token)
            .bind(&channel.default_target)
            .bind(channel.active)
            .bind(channel.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(channel)
    }

    async fn delete(&self, id: LineChannelId) -> Result<(), MimsError> {
        sqlx::query(DELETE_BY_ID)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}
