//! In-memory port implementations for tests.
//!
//! Enabled for this crate's unit tests and, through the `testing` feature,
//! for adapter crates that need a working backend without IO.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use mims_domain::activity::CaseActivity;
use mims_domain::attachment::Attachment;
use mims_domain::case::{Case, CaseQuery, CaseStatus, Severity};
use mims_domain::case_type::CaseType;
use mims_domain::error::{ConflictError, DeliveryError, MimsError};
use mims_domain::event::{CaseEvent, EventKind};
use mims_domain::id::{
    AttachmentId, CaseId, CaseTypeId, LineChannelId, NotificationId, ProviderId, TemplateId,
    UserId, WebhookId,
};
use mims_domain::line_channel::LineChannel;
use mims_domain::notification::{Notification, NotificationStatus};
use mims_domain::provider::Provider;
use mims_domain::template::NotificationTemplate;
use mims_domain::time::Timestamp;
use mims_domain::user::{Session, SessionToken, User};
use mims_domain::webhook::{DeliveryOutcome, Webhook};

use crate::event_bus::InProcessEventBus;
use crate::ports::{
    ActivityRepository, AttachmentRepository, Backend, BlobStore, CaseCounts, CaseRepository,
    CaseTypeRepository, EventPublisher, LineChannelRepository, LineMessenger,
    NotificationRepository, ProviderRepository, SessionRepository, TemplateRepository,
    UserRepository, WebhookRepository, WebhookRequest, WebhookSender,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A keyed in-memory table.
pub struct Table<K, V> {
    rows: Mutex<HashMap<K, V>>,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: std::hash::Hash + Eq + Copy, V: Clone> Table<K, V> {
    fn insert(&self, key: K, value: V) {
        lock(&self.rows).insert(key, value);
    }

    fn get(&self, key: K) -> Option<V> {
        lock(&self.rows).get(&key).cloned()
    }

    fn remove(&self, key: K) {
        lock(&self.rows).remove(&key);
    }

    fn filter(&self, pred: impl Fn(&V) -> bool) -> Vec<V> {
        lock(&self.rows).values().filter(|v| pred(v)).cloned().collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct InMemoryCases {
    rows: Table<CaseId, Case>,
    collisions: Mutex<usize>,
}

impl InMemoryCases {
    /// Make the next `n` inserts fail as if their reference were taken.
    pub fn collide_next(&self, n: usize) {
        *lock(&self.collisions) = n;
    }
}

impl CaseRepository for InMemoryCases {
    async fn create(&self, case: Case) -> Result<Case, MimsError> {
        let forced = {
            let mut collisions = lock(&self.collisions);
            let forced = *collisions > 0;
            *collisions = collisions.saturating_sub(1);
            forced
        };
        if forced || !self.rows.filter(|c| c.reference == case.reference).is_empty() {
            return Err(ConflictError::Duplicate("cases.reference".to_string()).into());
        }
        self.rows.insert(case.id, case.clone());
        Ok(case)
    }

    async fn get_by_id(&self, id: CaseId) -> Result<Option<Case>, MimsError> {
        Ok(self.rows.get(id))
    }

    async fn list(&self, query: &CaseQuery, now: Timestamp) -> Result<Vec<Case>, MimsError> {
        let mut cases = self.rows.filter(|c| query.matches(c, now));
        cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cases
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect())
    }

    async fn count(&self, query: &CaseQuery, now: Timestamp) -> Result<u64, MimsError> {
        Ok(self.rows.filter(|c| query.matches(c, now)).len() as u64)
    }

    async fn list_open(&self) -> Result<Vec<Case>, MimsError> {
        Ok(self.rows.filter(|c| c.status.is_open()))
    }

    async fn counts(&self) -> Result<CaseCounts, MimsError> {
        let cases = self.rows.filter(|_| true);
        let count_status =
            |s: CaseStatus| cases.iter().filter(|c| c.status == s).count() as u64;
        let count_severity =
            |s: Severity| cases.iter().filter(|c| c.severity == s).count() as u64;
        Ok(CaseCounts {
            by_status: CaseStatus::ALL
                .into_iter()
                .map(|s| (s, count_status(s)))
                .filter(|(_, n)| *n > 0)
                .collect(),
            by_severity: Severity::ALL
                .into_iter()
                .map(|s| (s, count_severity(s)))
                .filter(|(_, n)| *n > 0)
                .collect(),
        })
    }

    async fn uses_case_type(&self, id: CaseTypeId) -> Result<bool, MimsError> {
        Ok(!self.rows.filter(|c| c.case_type_id == Some(id)).is_empty())
    }

    async fn uses_provider(&self, id: ProviderId) -> Result<bool, MimsError> {
        Ok(!self.rows.filter(|c| c.provider_id == Some(id)).is_empty())
    }

    async fn update(&self, case: Case) -> Result<Case, MimsError> {
        self.rows.insert(case.id, case.clone());
        Ok(case)
    }

    async fn delete(&self, id: CaseId) -> Result<(), MimsError> {
        self.rows.remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCaseTypes(Table<CaseTypeId, CaseType>);

impl CaseTypeRepository for InMemoryCaseTypes {
    async fn create(&self, case_type: CaseType) -> Result<CaseType, MimsError> {
        self.0.insert(case_type.id, case_type.clone());
        Ok(case_type)
    }

    async fn get_by_id(&self, id: CaseTypeId) -> Result<Option<CaseType>, MimsError> {
        Ok(self.0.get(id))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<CaseType>, MimsError> {
        Ok(self
            .0
            .filter(|t| t.name.eq_ignore_ascii_case(name))
            .into_iter()
            .next())
    }

    async fn get_all(&self) -> Result<Vec<CaseType>, MimsError> {
        let mut all = self.0.filter(|_| true);
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn update(&self, case_type: CaseType) -> Result<CaseType, MimsError> {
        self.0.insert(case_type.id, case_type.clone());
        Ok(case_type)
    }

    async fn delete(&self, id: CaseTypeId) -> Result<(), MimsError> {
        self.0.remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryActivities(Mutex<Vec<CaseActivity>>);

impl ActivityRepository for InMemoryActivities {
    async fn append(&self, activity: CaseActivity) -> Result<CaseActivity, MimsError> {
        lock(&self.0).push(activity.clone());
        Ok(activity)
    }

    async fn list_for_case(&self, case_id: CaseId) -> Result<Vec<CaseActivity>, MimsError> {
        Ok(lock(&self.0)
            .iter()
            .filter(|a| a.case_id == case_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryAttachments(Table<AttachmentId, Attachment>);

impl AttachmentRepository for InMemoryAttachments {
    async fn create(&self, attachment: Attachment) -> Result<Attachment, MimsError> {
        self.0.insert(attachment.id, attachment.clone());
        Ok(attachment)
    }

    async fn get_by_id(&self, id: AttachmentId) -> Result<Option<Attachment>, MimsError> {
        Ok(self.0.get(id))
    }

    async fn list_for_case(&self, case_id: CaseId) -> Result<Vec<Attachment>, MimsError> {
        let mut all = self.0.filter(|a| a.case_id == case_id);
        all.sort_by_key(|a| a.created_at);
        Ok(all)
    }

    async fn delete(&self, id: AttachmentId) -> Result<(), MimsError> {
        self.0.remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProviders(Table<ProviderId, Provider>);

impl ProviderRepository for InMemoryProviders {
    async fn create(&self, provider: Provider) -> Result<Provider, MimsError> {
        self.0.insert(provider.id, provider.clone());
        Ok(provider)
    }

    async fn get_by_id(&self, id: ProviderId) -> Result<Option<Provider>, MimsError> {
        Ok(self.0.get(id))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Provider>, MimsError> {
        Ok(self
            .0
            .filter(|p| p.name.eq_ignore_ascii_case(name))
            .into_iter()
            .next())
    }

    async fn get_all(&self) -> Result<Vec<Provider>, MimsError> {
        let mut all = self.0.filter(|_| true);
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn update(&self, provider: Provider) -> Result<Provider, MimsError> {
        self.0.insert(provider.id, provider.clone());
        Ok(provider)
    }

    async fn delete(&self, id: ProviderId) -> Result<(), MimsError> {
        self.0.remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUsers(Table<UserId, User>);

impl UserRepository for InMemoryUsers {
    async fn create(&self, user: User) -> Result<User, MimsError> {
        self.0.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, MimsError> {
        Ok(self.0.get(id))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, MimsError> {
        Ok(self.0.filter(|u| u.email == email).into_iter().next())
    }

    async fn get_all(&self) -> Result<Vec<User>, MimsError> {
        let mut all = self.0.filter(|_| true);
        all.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(all)
    }

    async fn count(&self) -> Result<u64, MimsError> {
        Ok(self.0.len() as u64)
    }

    async fn update(&self, user: User) -> Result<User, MimsError> {
        self.0.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: UserId) -> Result<(), MimsError> {
        self.0.remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySessions(Mutex<HashMap<String, Session>>);

impl SessionRepository for InMemorySessions {
    async fn create(&self, session: Session) -> Result<Session, MimsError> {
        lock(&self.0).insert(session.token.as_str().to_string(), session.clone());
        Ok(session)
    }

    async fn get(&self, token: &SessionToken) -> Result<Option<Session>, MimsError> {
        Ok(lock(&self.0).get(token.as_str()).cloned())
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), MimsError> {
        lock(&self.0).remove(token.as_str());
        Ok(())
    }

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, MimsError> {
        let mut sessions = lock(&self.0);
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, MimsError> {
        let mut sessions = lock(&self.0);
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryWebhooks(Table<WebhookId, Webhook>);

impl WebhookRepository for InMemoryWebhooks {
    async fn create(&self, webhook: Webhook) -> Result<Webhook, MimsError> {
        self.0.insert(webhook.id, webhook.clone());
        Ok(webhook)
    }

    async fn get_by_id(&self, id: WebhookId) -> Result<Option<Webhook>, MimsError> {
        Ok(self.0.get(id))
    }

    async fn get_all(&self) -> Result<Vec<Webhook>, MimsError> {
        Ok(self.0.filter(|_| true))
    }

    async fn find_subscribed(&self, kind: EventKind) -> Result<Vec<Webhook>, MimsError> {
        Ok(self.0.filter(|w| w.subscribes_to(kind)))
    }

    async fn update(&self, webhook: Webhook) -> Result<Webhook, MimsError> {
        self.0.insert(webhook.id, webhook.clone());
        Ok(webhook)
    }

    async fn record_delivery(&self, outcome: &DeliveryOutcome) -> Result<(), MimsError> {
        let mut rows = lock(&self.0.rows);
        if let Some(webhook) = rows.get_mut(&outcome.webhook_id) {
            webhook.record(outcome);
        }
        Ok(())
    }

    async fn delete(&self, id: WebhookId) -> Result<(), MimsError> {
        self.0.remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryLineChannels(Table<LineChannelId, LineChannel>);

impl LineChannelRepository for InMemoryLineChannels {
    async fn create(&self, channel: LineChannel) -> Result<LineChannel, MimsError> {
        self.0.insert(channel.id, channel.clone());
        Ok(channel)
    }

    async fn get_by_id(&self, id: LineChannelId) -> Result<Option<LineChannel>, MimsError> {
        Ok(self.0.get(id))
    }

    async fn get_all(&self) -> Result<Vec<LineChannel>, MimsError> {
        Ok(self.0.filter(|_| true))
    }

    async fn update(&self, channel: LineChannel) -> Result<LineChannel, MimsError> {
        self.0.insert(channel.id, channel.clone());
        Ok(channel)
    }

    async fn delete(&self, id: LineChannelId) -> Result<(), MimsError> {
        self.0.remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTemplates(Table<TemplateId, NotificationTemplate>);

impl TemplateRepository for InMemoryTemplates {
    async fn create(
        &self,
        template: NotificationTemplate,
    ) -> Result<NotificationTemplate, MimsError> {
        self.0.insert(template.id, template.clone());
        Ok(template)
    }

    async fn get_by_id(&self, id: TemplateId) -> Result<Option<NotificationTemplate>, MimsError> {
        Ok(self.0.get(id))
    }

    async fn get_all(&self) -> Result<Vec<NotificationTemplate>, MimsError> {
        Ok(self.0.filter(|_| true))
    }

    async fn find_active_for_event(
        &self,
        kind: EventKind,
    ) -> Result<Vec<NotificationTemplate>, MimsError> {
        Ok(self.0.filter(|t| t.active && t.event == kind))
    }

    async fn uses_channel(&self, channel_id: LineChannelId) -> Result<bool, MimsError> {
        Ok(!self.0.filter(|t| t.channel_id == channel_id).is_empty())
    }

    async fn update(
        &self,
        template: NotificationTemplate,
    ) -> Result<NotificationTemplate, MimsError> {
        self.0.insert(template.id, template.clone());
        Ok(template)
    }

    async fn delete(&self, id: TemplateId) -> Result<(), MimsError> {
        self.0.remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryNotifications {
    rows: Table<NotificationId, Notification>,
    rejected: Mutex<Option<String>>,
}

impl InMemoryNotifications {
    /// Refuse to store rows whose message contains `needle`.
    pub fn reject_messages_containing(&self, needle: &str) {
        *lock(&self.rejected) = Some(needle.to_string());
    }
}

impl NotificationRepository for InMemoryNotifications {
    async fn enqueue(&self, notification: Notification) -> Result<Notification, MimsError> {
        if lock(&self.rejected)
            .as_deref()
            .is_some_and(|needle| notification.message.contains(needle))
        {
            return Err(ConflictError::Duplicate("notifications.id".to_string()).into());
        }
        self.rows.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn get_by_id(&self, id: NotificationId) -> Result<Option<Notification>, MimsError> {
        Ok(self.rows.get(id))
    }

    async fn list(
        &self,
        status: Option<NotificationStatus>,
        limit: u32,
    ) -> Result<Vec<Notification>, MimsError> {
        let mut rows = self.rows.filter(|n| status.is_none_or(|s| n.status == s));
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn pending(&self, limit: u32) -> Result<Vec<Notification>, MimsError> {
        let mut rows = self.rows.filter(|n| n.status == NotificationStatus::Pending);
        rows.sort_by_key(|n| n.created_at);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn save_outcome(&self, notification: &Notification) -> Result<(), MimsError> {
        self.rows.insert(notification.id, notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBlobs(Mutex<HashMap<String, Vec<u8>>>);

impl InMemoryBlobs {
    pub fn keys(&self) -> Vec<String> {
        lock(&self.0).keys().cloned().collect()
    }
}

impl BlobStore for InMemoryBlobs {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), MimsError> {
        lock(&self.0).insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MimsError> {
        Ok(lock(&self.0).get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), MimsError> {
        lock(&self.0).remove(key);
        Ok(())
    }
}

/// Keeps every published event.
#[derive(Default)]
pub struct RecordingPublisher(Mutex<Vec<CaseEvent>>);

impl RecordingPublisher {
    pub fn kinds(&self) -> Vec<EventKind> {
        lock(&self.0).iter().map(|e| e.kind).collect()
    }

    pub fn events(&self) -> Vec<CaseEvent> {
        lock(&self.0).clone()
    }
}

impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: CaseEvent) -> Result<(), MimsError> {
        lock(&self.0).push(event);
        Ok(())
    }
}

/// Answers every webhook request with a fixed status and keeps the requests.
pub struct RecordingSender {
    status: Mutex<u16>,
    requests: Mutex<Vec<WebhookRequest>>,
}

impl Default for RecordingSender {
    fn default() -> Self {
        Self {
            status: Mutex::new(200),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingSender {
    pub fn answer_with(&self, status: u16) {
        *lock(&self.status) = status;
    }

    pub fn requests(&self) -> Vec<WebhookRequest> {
        lock(&self.requests).clone()
    }
}

impl WebhookSender for RecordingSender {
    async fn send(&self, request: WebhookRequest) -> Result<u16, DeliveryError> {
        lock(&self.requests).push(request);
        let status = *lock(&self.status);
        if (200..300).contains(&status) {
            Ok(status)
        } else {
            Err(DeliveryError::Status(status))
        }
    }
}

/// Keeps pushed LINE messages; can be switched to fail.
#[derive(Default)]
pub struct RecordingMessenger {
    failing: Mutex<bool>,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    pub fn fail(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    /// `(target, text)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        lock(&self.sent).clone()
    }
}

impl LineMessenger for RecordingMessenger {
    async fn push_text(
        &self,
        _access_token: &str,
        target: &str,
        text: &str,
    ) -> Result<(), DeliveryError> {
        if *lock(&self.failing) {
            return Err(DeliveryError::Status(500));
        }
        lock(&self.sent).push((target.to_string(), text.to_string()));
        Ok(())
    }
}

/// Backend made of the in-memory implementations above.
pub struct InMemoryBackend;

impl Backend for InMemoryBackend {
    type Cases = InMemoryCases;
    type CaseTypes = InMemoryCaseTypes;
    type Activities = InMemoryActivities;
    type Attachments = InMemoryAttachments;
    type Providers = InMemoryProviders;
    type Users = InMemoryUsers;
    type Sessions = InMemorySessions;
    type Webhooks = InMemoryWebhooks;
    type LineChannels = InMemoryLineChannels;
    type Templates = InMemoryTemplates;
    type Notifications = InMemoryNotifications;
    type Blobs = InMemoryBlobs;
    type Publisher = Arc<InProcessEventBus>;
    type Sender = RecordingSender;
    type Messenger = RecordingMessenger;
}
