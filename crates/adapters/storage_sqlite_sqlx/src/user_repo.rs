//! `SQLite` implementation of [`UserRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use mims_app::ports::UserRepository;
use mims_domain::error::MimsError;
use mims_domain::id::UserId;
use mims_domain::user::User;

use crate::codec::{parse, parse_ts, ts, uint};
use crate::error::StorageError;

struct Wrapper(User);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<User> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let role: String = row.try_get("role")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Self(User {
            id: parse(&id)?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            role: parse(&role)?,
            active: row.try_get("active")?,
            line_user_id: row.try_get("line_user_id")?,
            password_hash: row.try_get("password_hash")?,
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO users (
        id, email, display_name, role, active, line_user_id, password_hash, created_at, updated_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM users WHERE id = ?";
const SELECT_BY_EMAIL: &str = "SELECT * FROM users WHERE email = ?";
const SELECT_ALL: &str = "SELECT * FROM users ORDER BY display_name COLLATE NOCASE";
const COUNT_ALL: &str = "SELECT COUNT(*) FROM users";
const UPDATE: &str = r"
    UPDATE users SET
        email = ?, display_name = ?, role = ?, active = ?, line_user_id = ?, password_hash = ?,
        updated_at = ?
    WHERE id = ?
";
const DELETE_BY_ID: &str = "DELETE FROM users WHERE id = ?";

/// `SQLite`-backed user repository.
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: User) -> Result<User, MimsError> {
        sqlx::query(INSERT)
            .bind(user.id.to_string())
            .bind(&user.email)
            .bind(&user.display_name)
            .bind(user.role.as_str())
            .bind(user.active)
            .bind(&user.line_user_id)
            .bind(&user.password_hash)
            .bind(ts(user.created_at))
            .bind(ts(user.updated_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(user)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, MimsError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, MimsError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_EMAIL)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<User>, MimsError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn count(&self) -> Result<u64, MimsError> {
        let (count,): (i64,) = sqlx::query_as(COUNT_ALL)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(uint(count))
    }

    async fn update(&self, user: User) -> Result<User, MimsError> {
        sqlx::query(UPDATE)
            .bind(&user.email)
            .bind(&user.display_name)
            .bind(user.role.as_str())
            .bind(user.active)
            .bind(&user.line_user_id)
            .bind(&user.password_hash)
            .bind(ts(user.updated_at))
            .bind(user.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(user)
    }

    async fn delete(&self, id: UserId) -> Result<(), MimsError> {
        sqlx::query(DELETE_BY_ID)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}
