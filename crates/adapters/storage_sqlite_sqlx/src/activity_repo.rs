//! `SQLite` implementation of [`ActivityRepository`].
//!
//! The activity kind is stored twice: its short name in `kind` for
//! filtering, and the full tagged JSON (with `from`/`to` details) in
//! `payload`.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use mims_app::ports::ActivityRepository;
use mims_domain::activity::{ActivityKind, CaseActivity};
use mims_domain::error::MimsError;
use mims_domain::id::CaseId;

use crate::codec::{decode_err, parse, parse_opt, parse_ts, ts};
use crate::error::StorageError;

struct Wrapper(CaseActivity);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let case_id: String = row.try_get("case_id")?;
        let actor_id: Option<String> = row.try_get("actor_id")?;
        let payload: String = row.try_get("payload")?;
        let created_at: String = row.try_get("created_at")?;

        let kind: ActivityKind = serde_json::from_str(&payload).map_err(decode_err)?;

        Ok(Self(CaseActivity {
            id: parse(&id)?,
            case_id: parse(&case_id)?,
            actor_id: parse_opt(actor_id)?,
            kind,
            note: row.try_get("note")?,
            created_at: parse_ts(&created_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO case_activities (id, case_id, actor_id, kind, payload, note, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_CASE: &str =
    "SELECT * FROM case_activities WHERE case_id = ? ORDER BY created_at ASC, rowid ASC";

/// `SQLite`-backed case timeline.
pub struct SqliteActivityRepository {
    pool: SqlitePool,
}

impl SqliteActivityRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ActivityRepository for SqliteActivityRepository {
    async fn append(&self, activity: CaseActivity) -> Result<CaseActivity, MimsError> {
        let payload = serde_json::to_string(&activity.kind).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(activity.id.to_string())
            .bind(activity.case_id.to_string())
            .bind(activity.actor_id.map(|id| id.to_string()))
            .bind(activity.kind.as_str())
            .bind(&payload)
            .bind(&activity.note)
            .bind(ts(activity.created_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(activity)
    }

    async fn list_for_case(&self, case_id: CaseId) -> Result<Vec<CaseActivity>, MimsError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_CASE)
            .bind(case_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case_repo::SqliteCaseRepository;
    use crate::pool::memory_pool;
    use mims_app::ports::CaseRepository;
    use mims_domain::case::{Case, CaseStatus};

    #[tokio::test]
    async fn should_keep_timeline_in_insertion_order_with_details() {
        let pool = memory_pool().await;
        let case = SqliteCaseRepository::new(pool.clone())
            .create(Case::builder().title("Leak").build().unwrap())
            .await
            .unwrap();
        let repo = SqliteActivityRepository::new(pool);

        repo.append(CaseActivity::new(case.id, None, ActivityKind::Created))
            .await
            .unwrap();
        repo.append(
            CaseActivity::new(
                case.id,
                None,
                ActivityKind::StatusChanged {
                    from: CaseStatus::New,
                    to: CaseStatus::InProgress,
                },
            )
            .with_note(Some("on it".into())),
        )
        .await
        .unwrap();

        let timeline = repo.list_for_case(case.id).await.unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].kind, ActivityKind::Created);
        assert_eq!(
            timeline[1].kind,
            ActivityKind::StatusChanged {
                from: CaseStatus::New,
                to: CaseStatus::InProgress
            }
        );
        assert_eq!(timeline[1].note.as_deref(), Some("on it"));
    }

    #[tokio::test]
    async fn should_drop_timeline_with_its_case() {
        let pool = memory_pool().await;
        let cases = SqliteCaseRepository::new(pool.clone());
        let case = cases
            .create(Case::builder().title("Leak").build().unwrap())
            .await
            .unwrap();
        let repo = SqliteActivityRepository::new(pool);
        repo.append(CaseActivity::new(case.id, None, ActivityKind::Created))
            .await
            .unwrap();

        cases.delete(case.id).await.unwrap();
        assert!(repo.list_for_case(case.id).await.unwrap().is_empty());
    }
}
