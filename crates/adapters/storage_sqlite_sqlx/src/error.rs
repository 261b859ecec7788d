//! Storage-specific error type wrapping sqlx errors.

use mims_domain::error::{ConflictError, MimsError};

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to (de)serialize a stored JSON column.
    #[error("JSON column error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for MimsError {
    fn from(err: StorageError) -> Self {
        match err {
            // services check uniqueness first; this only fires on a concurrent insert
            StorageError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                ConflictError::Duplicate(db.message().to_string()).into()
            }
            other => Self::Storage(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn should_map_unique_violation_to_conflict() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE t (name TEXT NOT NULL UNIQUE)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO t (name) VALUES ('ops')")
            .execute(&pool)
            .await
            .unwrap();
        let err = sqlx::query("INSERT INTO t (name) VALUES ('ops')")
            .execute(&pool)
            .await
            .unwrap_err();

        let err = MimsError::from(StorageError::from(err));
        assert!(matches!(
            err,
            MimsError::Conflict(ConflictError::Duplicate(_))
        ));
    }

    #[test]
    fn should_wrap_other_failures_as_storage() {
        let err = MimsError::from(StorageError::from(sqlx::Error::RowNotFound));
        assert!(matches!(err, MimsError::Storage(_)));
    }
}
