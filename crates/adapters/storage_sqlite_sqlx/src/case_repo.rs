//! `SQLite` implementation of [`CaseRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use mims_app::ports::{CaseCounts, CaseRepository};
use mims_domain::case::{Case, CaseQuery, CaseStatus, Severity};
use mims_domain::error::MimsError;
use mims_domain::id::{CaseId, CaseTypeId, ProviderId};
use mims_domain::time::Timestamp;

use crate::codec::{opt_ts, parse, parse_opt, parse_opt_ts, parse_ts, ts, uint};
use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`Case`].
struct Wrapper(Case);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Case> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let case_type_id: Option<String> = row.try_get("case_type_id")?;
        let provider_id: Option<String> = row.try_get("provider_id")?;
        let status: String = row.try_get("status")?;
        let severity: String = row.try_get("severity")?;
        let assignee_id: Option<String> = row.try_get("assignee_id")?;
        let reporter_id: Option<String> = row.try_get("reporter_id")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Self(Case {
            id: parse(&id)?,
            reference: row.try_get("reference")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            case_type_id: parse_opt(case_type_id)?,
            provider_id: parse_opt(provider_id)?,
            status: parse(&status)?,
            severity: parse(&severity)?,
            assignee_id: parse_opt(assignee_id)?,
            reporter_id: parse_opt(reporter_id)?,
            contact_name: row.try_get("contact_name")?,
            contact_phone: row.try_get("contact_phone")?,
            location: row.try_get("location")?,
            response_due_at: parse_opt_ts(row.try_get("response_due_at")?)?,
            resolution_due_at: parse_opt_ts(row.try_get("resolution_due_at")?)?,
            first_response_at: parse_opt_ts(row.try_get("first_response_at")?)?,
            resolved_at: parse_opt_ts(row.try_get("resolved_at")?)?,
            closed_at: parse_opt_ts(row.try_get("closed_at")?)?,
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO cases (
        id, reference, title, description, case_type_id, provider_id, status, severity,
        assignee_id, reporter_id, contact_name, contact_phone, location,
        response_due_at, resolution_due_at, first_response_at, resolved_at, closed_at,
        created_at, updated_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM cases WHERE id = ?";
const SELECT_OPEN: &str =
    "SELECT * FROM cases WHERE status NOT IN ('resolved', 'closed', 'cancelled')";
const COUNT_BY_STATUS: &str = "SELECT status, COUNT(*) AS n FROM cases GROUP BY status";
const COUNT_BY_SEVERITY: &str = "SELECT severity, COUNT(*) AS n FROM cases GROUP BY severity";
const USES_CASE_TYPE: &str = "SELECT EXISTS (SELECT 1 FROM cases WHERE case_type_id = ?)";
const USES_PROVIDER: &str = "SELECT EXISTS (SELECT 1 FROM cases WHERE provider_id = ?)";
const UPDATE: &str = r"
    UPDATE cases SET
        title = ?, description = ?, case_type_id = ?, provider_id = ?, status = ?, severity = ?,
        assignee_id = ?, reporter_id = ?, contact_name = ?, contact_phone = ?, location = ?,
        response_due_at = ?, resolution_due_at = ?, first_response_at = ?, resolved_at = ?,
        closed_at = ?, updated_at = ?
    WHERE id = ?
";
const DELETE_BY_ID: &str = "DELETE FROM cases WHERE id = ?";

/// Append the `WHERE` clause matching [`CaseQuery::matches`].
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &CaseQuery, now: Timestamp) {
    builder.push(" WHERE 1 = 1");
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(severity) = query.severity {
        builder.push(" AND severity = ").push_bind(severity.as_str());
    }
    if let Some(id) = query.case_type_id {
        builder.push(" AND case_type_id = ").push_bind(id.to_string());
    }
    if let Some(id) = query.provider_id {
        builder.push(" AND provider_id = ").push_bind(id.to_string());
    }
    if let Some(id) = query.assignee_id {
        builder.push(" AND assignee_id = ").push_bind(id.to_string());
    }
    if query.open_only || query.overdue_only {
        builder.push(" AND status NOT IN ('resolved', 'closed', 'cancelled')");
    }
    if query.overdue_only {
        builder
            .push(" AND resolution_due_at IS NOT NULL AND resolution_due_at < ")
            .push_bind(ts(now));
    }
    // SQLite lower() folds ASCII only, the term must be folded the same way
    if let Some(term) = query.search_term() {
        let term = term.to_ascii_lowercase();
        builder
            .push(" AND (instr(lower(reference), ")
            .push_bind(term.clone())
            .push(") > 0 OR instr(lower(title), ")
            .push_bind(term.clone())
            .push(") > 0 OR instr(lower(coalesce(description, '')), ")
            .push_bind(term)
            .push(") > 0)");
    }
}

/// `SQLite`-backed case repository.
pub struct SqliteCaseRepository {
    pool: SqlitePool,
}

impl SqliteCaseRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl CaseRepository for SqliteCaseRepository {
    async fn create(&self, case: Case) -> Result<Case, MimsError> {
        sqlx::query(INSERT)
            .bind(case.id.to_string())
            .bind(&case.reference)
            .bind(&case.title)
            .bind(&case.description)
            .bind(case.case_type_id.map(|id| id.to_string()))
            .bind(case.provider_id.map(|id| id.to_string()))
            .bind(case.status.as_str())
            .bind(case.severity.as_str())
            .bind(case.assignee_id.map(|id| id.to_string()))
            .bind(case.reporter_id.map(|id| id.to_string()))
            .bind(&case.contact_name)
            .bind(&case.contact_phone)
            .bind(&case.location)
            .bind(opt_ts(case.response_due_at))
            .bind(opt_ts(case.resolution_due_at))
            .bind(opt_ts(case.first_response_at))
            .bind(opt_ts(case.resolved_at))
            .bind(opt_ts(case.closed_at))
            .bind(ts(case.created_at))
            .bind(ts(case.updated_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(case)
    }

    async fn get_by_id(&self, id: CaseId) -> Result<Option<Case>, MimsError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn list(&self, query: &CaseQuery, now: Timestamp) -> Result<Vec<Case>, MimsError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM cases");
        push_filters(&mut builder, query, now);
        builder
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(i64::from(query.limit()))
            .push(" OFFSET ")
            .push_bind(i64::from(query.offset()));

        let rows: Vec<Wrapper> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn count(&self, query: &CaseQuery, now: Timestamp) -> Result<u64, MimsError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM cases");
        push_filters(&mut builder, query, now);

        let (total,): (i64,) = builder
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(uint(total))
    }

    async fn list_open(&self) -> Result<Vec<Case>, MimsError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_OPEN)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn counts(&self) -> Result<CaseCounts, MimsError> {
        let statuses: Vec<(String, i64)> = sqlx::query_as(COUNT_BY_STATUS)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        let severities: Vec<(String, i64)> = sqlx::query_as(COUNT_BY_SEVERITY)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let mut by_status = Vec::with_capacity(statuses.len());
        for (status, n) in statuses {
            let status: CaseStatus = parse(&status).map_err(StorageError::from)?;
            by_status.push((status, uint(n)));
        }
        by_status.sort_by_key(|(status, _)| CaseStatus::ALL.iter().position(|s| s == status));

        let mut by_severity = Vec::with_capacity(severities.len());
        for (severity, n) in severities {
            let severity: Severity = parse(&severity).map_err(StorageError::from)?;
            by_severity.push((severity, uint(n)));
        }
        by_severity.sort_by_key(|(severity, _)| *severity);

        Ok(CaseCounts {
            by_status,
            by_severity,
        })
    }

    async fn uses_case_type(&self, id: CaseTypeId) -> Result<bool, MimsError> {
        let (used,): (bool,) = sqlx::query_as(USES_CASE_TYPE)
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(used)
    }

    async fn uses_provider(&self, id: ProviderId) -> Result<bool, MimsError> {
        let (used,): (bool,) = sqlx::query_as(USES_PROVIDER)
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(used)
    }

    async fn update(&self, case: Case) -> Result<Case, MimsError> {
        sqlx::query(UPDATE)
            .bind(&case.title)
            .bind(&case.description)
            .bind(case.case_type_id.map(|id| id.to_string()))
            .bind(case.provider_id.map(|id| id.to_string()))
            .bind(case.status.as_str())
            .bind(case.severity.as_str())
            .bind(case.assignee_id.map(|id| id.to_string()))
            .bind(case.reporter_id.map(|id| id.to_string()))
            .bind(&case.contact_name)
            .bind(&case.contact_phone)
            .bind(&case.location)
            .bind(opt_ts(case.response_due_at))
            .bind(opt_ts(case.resolution_due_at))
            .bind(opt_ts(case.first_response_at))
            .bind(opt_ts(case.resolved_at))
            .bind(opt_ts(case.closed_at))
            .bind(ts(case.updated_at))
            .bind(case.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(case)
    }

    async fn delete(&self, id: CaseId) -> Result<(), MimsError> {
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
    use mims_domain::time::now;

    async fn setup() -> SqliteCaseRepository {
        SqliteCaseRepository::new(memory_pool().await)
    }

    fn case(title: &str) -> Case {
        Case::builder().title(title).build().unwrap()
    }

    #[tokio::test]
    async fn should_create_and_retrieve_case_with_all_fields() {
        let repo = setup().await;
        let created = Case::builder()
            .title("Air conditioner leaking")
            .description("Water on the floor")
            .severity(Severity::High)
            .contact_name("Somchai")
            .location("Floor 3")
            .build()
            .unwrap();
        let id = created.id;
        repo.create(created.clone()).await.unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.reference, created.reference);
        assert_eq!(fetched.severity, Severity::High);
        assert_eq!(fetched.location.as_deref(), Some("Floor 3"));
        assert_eq!(
            fetched.resolution_due_at.map(|t| t.timestamp_micros()),
            created.resolution_due_at.map(|t| t.timestamp_micros())
        );
    }

    #[tokio::test]
    async fn should_return_none_when_case_not_found() {
        let repo = setup().await;
        assert!(repo.get_by_id(CaseId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_filter_by_status_and_search_term() {
        let repo = setup().await;
        repo.create(case("Printer jam")).await.unwrap();
        let mut cancelled = case("Printer toner");
        cancelled.transition_to(CaseStatus::Cancelled, now()).unwrap();
        repo.create(cancelled).await.unwrap();
        repo.create(case("Network down")).await.unwrap();

        let query = CaseQuery {
            search: Some("PRINTER".into()),
            ..CaseQuery::default()
        };
        assert_eq!(repo.count(&query, now()).await.unwrap(), 2);

        let open = CaseQuery {
            open_only: true,
            ..query
        };
        let rows = repo.list(&open, now()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Printer jam");
    }

    #[tokio::test]
    async fn should_fold_only_ascii_letters_when_searching() {
        let repo = setup().await;
        repo.create(case("ÉTAGE 3 fuite")).await.unwrap();

        let search = |term: &str| CaseQuery {
            search: Some(term.into()),
            ..CaseQuery::default()
        };
        assert_eq!(repo.count(&search("ÉTAGE"), now()).await.unwrap(), 1);
        assert_eq!(repo.count(&search("Étage"), now()).await.unwrap(), 1);
        assert_eq!(repo.count(&search("FUITE"), now()).await.unwrap(), 1);
        assert_eq!(repo.count(&search("étage"), now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn should_list_overdue_cases_only() {
        let repo = setup().await;
        let mut overdue = case("Late");
        overdue.resolution_due_at = Some(now() - chrono::Duration::hours(1));
        repo.create(overdue).await.unwrap();
        repo.create(case("On time")).await.unwrap();

        let query = CaseQuery {
            overdue_only: true,
            ..CaseQuery::default()
        };
        let rows = repo.list(&query, now()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Late");
    }

    #[tokio::test]
    async fn should_page_newest_first() {
        let repo = setup().await;
        let base = now();
        for (i, title) in ["first", "second", "third"].into_iter().enumerate() {
            let created = Case::builder()
                .title(title)
                .created_at(base + chrono::Duration::seconds(i64::try_from(i).unwrap()))
                .build()
                .unwrap();
            repo.create(created).await.unwrap();
        }

        let page = CaseQuery {
            limit: Some(2),
            offset: Some(1),
            ..CaseQuery::default()
        };
        let titles: Vec<String> = repo
            .list(&page, now())
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, ["second", "first"]);
    }

    #[tokio::test]
    async fn should_count_by_status_and_severity() {
        let repo = setup().await;
        repo.create(case("a")).await.unwrap();
        repo.create(Case::builder().title("b").severity(Severity::Critical).build().unwrap())
            .await
            .unwrap();

        let counts = repo.counts().await.unwrap();
        assert_eq!(counts.by_status, vec![(CaseStatus::New, 2)]);
        assert_eq!(
            counts.by_severity,
            vec![(Severity::Medium, 1), (Severity::Critical, 1)]
        );
    }

    #[tokio::test]
    async fn should_update_and_delete_case() {
        let repo = setup().await;
        let mut created = repo.create(case("Broken door")).await.unwrap();
        created.transition_to(CaseStatus::InProgress, now()).unwrap();
        repo.update(created.clone()).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, CaseStatus::InProgress);
        assert!(fetched.first_response_at.is_some());
        assert_eq!(repo.list_open().await.unwrap().len(), 1);

        repo.delete(created.id).await.unwrap();
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }
}
