//! `SQLite` implementation of [`ProviderRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use mims_app::ports::ProviderRepository;
use mims_domain::error::MimsError;
use mims_domain::id::ProviderId;
use mims_domain::provider::Provider;

use crate::codec::{parse, parse_ts, ts};
use crate::error::StorageError;

struct Wrapper(Provider);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Provider> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Self(Provider {
            id: parse(&id)?,
            name: row.try_get("name")?,
            contact_email: row.try_get("contact_email")?,
            contact_phone: row.try_get("contact_phone")?,
            active: row.try_get("active")?,
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO providers (id, name, contact_email, contact_phone, active, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM providers WHERE id = ?";
const SELECT_BY_NAME: &str = "SELECT * FROM providers WHERE name = ? COLLATE NOCASE";
const SELECT_ALL: &str = "SELECT * FROM providers ORDER BY name COLLATE NOCASE";
const UPDATE: &str = r"
    UPDATE providers SET name = ?, contact_email = ?, contact_phone = ?, active = ?, updated_at = ?
    WHERE id = ?
";
const DELETE_BY_ID: &str = "DELETE FROM providers WHERE id = ?";

/// `SQLite`-backed provider repository.
pub struct SqliteProviderRepository {
    pool: SqlitePool,
}

impl SqliteProviderRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ProviderRepository for SqliteProviderRepository {
    async fn create(&self, provider: Provider) -> Result<Provider, MimsError> {
        sqlx::query(INSERT)
            .bind(provider.id.to_string())
            .bind(&provider.name)
            .bind(&provider.contact_email)
            .bind(&provider.contact_phone)
            .bind(provider.active)
            .bind(ts(provider.created_at))
            .bind(ts(provider.updated_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(provider)
    }

    async fn get_by_id(&self, id: ProviderId) -> Result<Option<Provider>, MimsError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Provider>, MimsError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_NAME)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<Provider>, MimsError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, provider: Provider) -> Result<Provider, MimsError> {
        sqlx::query(UPDATE)
            .bind(&provider.name)
            .bind(&provider.contact_email)
            .bind(&provider.contact_phone)
            .bind(provider.active)
            .bind(ts(provider.updated_at))
            .bind(provider.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(provider)
    }

    async fn delete(&self, id: ProviderId) -> Result<(), MimsError> {
        sqlx::query(DELETE_BY_ID)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}
