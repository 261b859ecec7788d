//! `SQLite` implementation of [`WebhookRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use mims_app::ports::WebhookRepository;
use mims_domain::error::MimsError;
use mims_domain::event::EventKind;
use mims_domain::id::WebhookId;
use mims_domain::webhook::{DeliveryOutcome, Webhook};

use crate::codec::{decode_err, int, opt_ts, parse, parse_opt_ts, parse_ts, ts, uint};
use crate::error::StorageError;

struct Wrapper(Webhook);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let events: String = row.try_get("events")?;
        let events: Vec<EventKind> = serde_json::from_str(&events).map_err(decode_err)?;
        let success_count: i64 = row.try_get("success_count")?;
        let failure_count: i64 = row.try_get("failure_count")?;
        let last_status: Option<i64> = row.try_get("last_status")?;
        let last_delivered_at: Option<String> = row.try_get("last_delivered_at")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Self(Webhook {
            id: parse(&id)?,
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            secret: row.try_get("secret")?,
            events,
            active: row.try_get("active")?,
            success_count: uint(success_count),
            failure_count: uint(failure_count),
            last_status: last_status.and_then(|code| u16::try_from(code).ok()),
            last_error: row.try_get("last_error")?,
            last_delivered_at: parse_opt_ts(last_delivered_at)?,
            created_at: parse_ts(&created_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO webhooks (
        id, name, url, secret, events, active, success_count, failure_count,
        last_status, last_error, last_delivered_at, created_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM webhooks WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM webhooks ORDER BY created_at";
const SELECT_ACTIVE: &str = "SELECT * FROM webhooks WHERE active = 1 ORDER BY created_at";
const UPDATE: &str = r"
    UPDATE webhooks SET name = ?, url = ?, secret = ?, events = ?, active = ?
    WHERE id = ?
";
const RECORD_DELIVERY: &str = r"
    UPDATE webhooks SET
        success_count = success_count + ?,
        failure_count = failure_count + ?,
        last_status = ?,
        last_error = ?,
        last_delivered_at = ?
    WHERE id = ?
";
const DELETE_BY_ID: &str = "DELETE FROM webhooks WHERE id = ?";

fn encode_events(events: &[EventKind]) -> Result<String, StorageError> {
    Ok(serde_json::to_string(events)?)
}

/// `SQLite`-backed webhook repository.
pub struct SqliteWebhookRepository {
    pool: SqlitePool,
}

impl SqliteWebhookRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl WebhookRepository for SqliteWebhookRepository {
    async fn create(&self, webhook: Webhook) -> Result<Webhook, MimsError> {
        sqlx::query(INSERT)
            .bind(webhook.id.to_string())
            .bind(&webhook.name)
            .bind(&webhook.url)
            .bind(&webhook.secret)
            .bind(encode_events(&webhook.events)?)
            .bind(webhook.active)
            .bind(int(webhook.success_count))
            .bind(int(webhook.failure_count))
            .bind(webhook.last_status.map(i64::from))
            .bind(&webhook.last_error)
            .bind(opt_ts(webhook.last_delivered_at))
            .bind(ts(webhook.created_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(webhook)
    }

    async fn get_by_id(&self, id: WebhookId) -> Result<Option<Webhook>, MimsError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|w| w.0))
    }

    async fn get_all(&self) -> Result<Vec<Webhook>, MimsError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn find_subscribed(&self, kind: EventKind) -> Result<Vec<Webhook>, MimsError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ACTIVE)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .map(|w| w.0)
            .filter(|webhook| webhook.subscribes_to(kind))
            .collect())
    }

    async fn update(&self, webhook: Webhook) -> Result<Webhook, MimsError> {
        sqlx::query(UPDATE)
            .bind(&webhook.name)
            .bind(&webhook.url)
            .bind(&webhook.secret)
            .bind(encode_events(&webhook.events)?)
            .bind(webhook.active)
            .bind(webhook.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(webhook)
    }

    async fn record_delivery(&self, outcome: &DeliveryOutcome) -> Result<(), MimsError> {
        let (success, failure) = if outcome.success { (1, 0) } else { (0, 1) };
        sqlx::query(RECORD_DELIVERY)
            .bind(success)
            .bind(failure)
            .bind(outcome.status.map(i64::from))
            .bind(&outcome.error)
            .bind(ts(outcome.delivered_at))
            .bind(outcome.webhook_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn delete(&self, id: WebhookId) -> Result<(), MimsError> {
        sqlx::query(DELETE_BY_ID)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}
