//! `SQLite` implementation of [`TemplateRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use mims_app::ports::TemplateRepository;
use mims_domain::error::MimsError;
use mims_domain::event::EventKind;
use mims_domain::id::{LineChannelId, TemplateId};
use mims_domain::template::NotificationTemplate;

use crate::codec::{parse, parse_ts, ts};
use crate::error::StorageError;

struct Wrapper(NotificationTemplate);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let event: String = row.try_get("event")?;
        let channel_id: String = row.try_get("channel_id")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Self(NotificationTemplate {
            id: parse(&id)?,
            name: row.try_get("name")?,
            event: parse(&event)?,
            channel_id: parse(&channel_id)?,
            body: row.try_get("body")?,
            active: row.try_get("active")?,
            created_at: parse_ts(&created_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO notification_templates (id, name, event, channel_id, body, active, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM notification_templates WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM notification_templates ORDER BY event, name";
const SELECT_ACTIVE_FOR_EVENT: &str =
    "SELECT * FROM notification_templates WHERE event = ? AND active = 1 ORDER BY created_at";
const USES_CHANNEL: &str =
    "SELECT EXISTS (SELECT 1 FROM notification_templates WHERE channel_id = ?)";
const UPDATE: &str = r"
    UPDATE notification_templates SET name = ?, event = ?, channel_id = ?, body = ?, active = ?
    WHERE id = ?
";
const DELETE_BY_ID: &str = "DELETE FROM notification_templates WHERE id = ?";

/// `SQLite`-backed notification template repository.
pub struct SqliteTemplateRepository {
    pool: SqlitePool,
}

impl SqliteTemplateRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl TemplateRepository for SqliteTemplateRepository {
    async fn create(
        &self,
        template: NotificationTemplate,
    ) -> Result<NotificationTemplate, MimsError> {
        sqlx::query(INSERT)
            .bind(template.id.to_string())
            .bind(&template.name)
            .bind(template.event.as_str())
            .bind(template.channel_id.to_string())
            .bind(&template.body)
            .bind(template.active)
            .bind(ts(template.created_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(template)
    }

    async fn get_by_id(&self, id: TemplateId) -> Result<Option<NotificationTemplate>, MimsError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|w| w.0))
    }

    async fn get_all(&self) -> Result<Vec<NotificationTemplate>, MimsError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn find_active_for_event(
        &self,
        kind: EventKind,
    ) -> Result<Vec<NotificationTemplate>, MimsError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ACTIVE_FOR_EVENT)
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn uses_channel(&self, channel_id: LineChannelId) -> Result<bool, MimsError> {
        let (used,): (bool,) = sqlx::query_as(USES_CHANNEL)
            .bind(channel_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(used)
    }

    async fn update(
        &self,
        template: NotificationTemplate,
    ) -> Result<NotificationTemplate, MimsError> {
        sqlx::query(UPDATE)
            .bind(&template.name)
            .bind(template.event.as_str())
            .bind(template.channel_id.to_string())
            .bind(&template.body)
            .bind(template.active)
            .bind(template.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(template)
    }

    async fn delete(&self, id: TemplateId) -> Result<(), MimsError> {
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
    use crate::line_channel_repo::SqliteLineChannelRepository;
    use crate::pool::memory_pool;
    use mims_app::ports::LineChannelRepository;
    use mims_domain::line_channel::LineChannel;

    async fn setup() -> (SqliteTemplateRepository, LineChannelId) {
        let pool = memory_pool().await;
        let channel = SqliteLineChannelRepository::new(pool.clone())
            .create(
                LineChannel::builder()
                    .name("Ops")
                    .access_token("token")
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        (SqliteTemplateRepository::new(pool), channel.id)
    }

    fn template(channel_id: LineChannelId, event: EventKind, active: bool) -> NotificationTemplate {
        let mut template = NotificationTemplate::builder()
            .name("t")
            .event(event)
            .channel_id(channel_id)
            .body("{{ case.title }}")
            .build()
            .unwrap();
        template.active = active;
        template
    }

    #[tokio::test]
    async fn should_find_active_templates_for_event() {
        let (repo, channel_id) = setup().await;
        let wanted = repo
            .create(template(channel_id, EventKind::CaseAssigned, true))
            .await
            .unwrap();
        repo.create(template(channel_id, EventKind::CaseAssigned, false))
            .await
            .unwrap();
        repo.create(template(channel_id, EventKind::CaseCreated, true))
            .await
            .unwrap();

        let found = repo
            .find_active_for_event(EventKind::CaseAssigned)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, wanted.id);
    }

    #[tokio::test]
    async fn should_report_channel_usage() {
        let (repo, channel_id) = setup().await;
        assert!(!repo.uses_channel(channel_id).await.unwrap());
        repo.create(template(channel_id, EventKind::CaseCreated, true))
            .await
            .unwrap();
        assert!(repo.uses_channel(channel_id).await.unwrap());
    }
}
