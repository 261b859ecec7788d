//! `SQLite` implementation of [`CaseTypeRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use mims_app::ports::CaseTypeRepository;
use mims_domain::case_type::CaseType;
use mims_domain::error::MimsError;
use mims_domain::id::CaseTypeId;

use crate::codec::{parse, parse_ts, ts};
use crate::error::StorageError;

struct Wrapper(CaseType);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<CaseType> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let default_severity: String = row.try_get("default_severity")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Self(CaseType {
            id: parse(&id)?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            default_severity: parse(&default_severity)?,
            response_sla_minutes: row.try_get("response_sla_minutes")?,
            resolution_sla_minutes: row.try_get("resolution_sla_minutes")?,
            active: row.try_get("active")?,
            created_at: parse_ts(&created_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO case_types (
        id, name, description, default_severity, response_sla_minutes,
        resolution_sla_minutes, active, created_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM case_types WHERE id = ?";
const SELECT_BY_NAME: &str = "SELECT * FROM case_types WHERE name = ? COLLATE NOCASE";
const SELECT_ALL: &str = "SELECT * FROM case_types ORDER BY name COLLATE NOCASE";
const UPDATE: &str = r"
    UPDATE case_types SET
        name = ?, description = ?, default_severity = ?, response_sla_minutes = ?,
        resolution_sla_minutes = ?, active = ?
    WHERE id = ?
";
const DELETE_BY_ID: &str = "DELETE FROM case_types WHERE id = ?";

/// `SQLite`-backed case type repository.
pub struct SqliteCaseTypeRepository {
    pool: SqlitePool,
}

impl SqliteCaseTypeRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl CaseTypeRepository for SqliteCaseTypeRepository {
    async fn create(&self, case_type: CaseType) -> Result<CaseType, MimsError> {
        sqlx::query(INSERT)
            .bind(case_type.id.to_string())
            .bind(&case_type.name)
            .bind(&case_type.description)
            .bind(case_type.default_severity.as_str())
            .bind(case_type.response_sla_minutes)
            .bind(case_type.resolution_sla_minutes)
            .bind(case_type.active)
            .bind(ts(case_type.created_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(case_type)
    }

    async fn get_by_id(&self, id: CaseTypeId) -> Result<Option<CaseType>, MimsError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<CaseType>, MimsError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_NAME)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<CaseType>, MimsError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, case_type: CaseType) -> Result<CaseType, MimsError> {
        sqlx::query(UPDATE)
            .bind(&case_type.name)
            .bind(&case_type.description)
            .bind(case_type.default_severity.as_str())
            .bind(case_type.response_sla_minutes)
            .bind(case_type.resolution_sla_minutes)
            .bind(case_type.active)
            .bind(case_type.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(case_type)
    }

    async fn delete(&self, id: CaseTypeId) -> Result<(), MimsError> {
        sqlx::query(DELETE_BY_ID)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::memory_pool;
    use mims_domain::case::Severity;

    async fn setup() -> SqliteCaseTypeRepository {
        SqliteCaseTypeRepository::new(memory_pool().await)
    }

    #[tokio::test]
    async fn should_create_and_find_case_type_by_name_ignoring_case() {
        let repo = setup().await;
        let case_type = CaseType::builder()
            .name("Power outage")
            .default_severity(Severity::Critical)
            .response_sla_minutes(15)
            .build()
            .unwrap();
        repo.create(case_type.clone()).await.unwrap();

        let found = repo.find_by_name("power OUTAGE").await.unwrap().unwrap();
        assert_eq!(found.id, case_type.id);
        assert_eq!(found.default_severity, Severity::Critical);
        assert_eq!(found.response_sla_minutes, Some(15));
        assert!(found.resolution_sla_minutes.is_none());
    }

    #[tokio::test]
    async fn should_update_and_delete_case_type() {
        let repo = setup().await;
        let mut case_type = repo
            .create(CaseType::builder().name("Network").build().unwrap())
            .await
            .unwrap();
        case_type.active = false;
        repo.update(case_type.clone()).await.unwrap();
        assert!(!repo.get_by_id(case_type.id).await.unwrap().unwrap().active);

        repo.delete(case_type.id).await.unwrap();
        assert!(repo.get_all().await.unwrap().is_empty());
    }
}
