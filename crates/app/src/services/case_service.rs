//! Case service: use-cases for the case lifecycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use mims_domain::activity::{ActivityKind, CaseActivity};
use mims_domain::case::{Case, CaseQuery, CaseStatus, Page, Severity, SlaStatus};
use mims_domain::case_type::{CaseType, sla_policy};
use mims_domain::error::{ConflictError, MimsError, NotFoundError, ValidationError};
use mims_domain::event::{CaseEvent, EventKind};
use mims_domain::id::{CaseId, CaseTypeId, ProviderId, UserId};
use mims_domain::time::now;
use mims_domain::user::User;

use crate::ports::{
    ActivityRepository, CaseRepository, CaseTypeRepository, EventPublisher, ProviderRepository,
    UserRepository,
};

/// Inserts tried before a reference clash is reported to the caller.
const CREATE_ATTEMPTS: usize = 5;

/// Input for [`CaseService::create_case`].
#[derive(Debug, Clone, Default)]
pub struct NewCase {
    pub title: String,
    pub description: Option<String>,
    pub case_type_id: Option<CaseTypeId>,
    pub provider_id: Option<ProviderId>,
    /// Falls back to the case type's default severity.
    pub severity: Option<Severity>,
    pub assignee_id: Option<UserId>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub location: Option<String>,
}

/// Partial update for [`CaseService::update_case`].
///
/// `None` leaves a field untouched. For optional text fields an empty string
/// clears the value.
#[derive(Debug, Clone, Default)]
pub struct CaseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub case_type_id: Option<Option<CaseTypeId>>,
    pub provider_id: Option<Option<ProviderId>>,
    pub severity: Option<Severity>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub location: Option<String>,
}

/// Aggregated numbers for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: u64,
    pub open: u64,
    pub unassigned: u64,
    pub by_status: BTreeMap<&'static str, u64>,
    pub by_severity: BTreeMap<&'static str, u64>,
    pub sla_on_track: u64,
    pub sla_at_risk: u64,
    pub sla_breached: u64,
}

/// Application service for cases and their timeline.
pub struct CaseService<C, T, R, A, U, P> {
    cases: Arc<C>,
    case_types: Arc<T>,
    providers: Arc<R>,
    activities: Arc<A>,
    users: Arc<U>,
    publisher: P,
}

fn not_found(id: CaseId) -> MimsError {
    NotFoundError {
        entity: "Case",
        id: id.to_string(),
    }
    .into()
}

/// `Some("")` becomes `Some(None)` so blank input clears a field.
fn text_change(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| {
        let v = v.trim().to_string();
        (!v.is_empty()).then_some(v)
    })
}

impl<C, T, R, A, U, P> CaseService<C, T, R, A, U, P>
where
    C: CaseRepository + Send + Sync,
    T: CaseTypeRepository + Send + Sync,
    R: ProviderRepository + Send + Sync,
    A: ActivityRepository + Send + Sync,
    U: UserRepository + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    /// Create a new service backed by the given repositories and publisher.
    pub fn new(
        cases: Arc<C>,
        case_types: Arc<T>,
        providers: Arc<R>,
        activities: Arc<A>,
        users: Arc<U>,
        publisher: P,
    ) -> Self {
        Self {
            cases,
            case_types,
            providers,
            activities,
            users,
            publisher,
        }
    }

    async fn resolve_case_type(&self, id: CaseTypeId) -> Result<CaseType, MimsError> {
        match self.case_types.get_by_id(id).await? {
            Some(case_type) if case_type.active => Ok(case_type),
            Some(_) => Err(ValidationError::InvalidIdentifier { kind: "case_type" }.into()),
            None => Err(NotFoundError {
                entity: "CaseType",
                id: id.to_string(),
            }
            .into()),
        }
    }

    async fn ensure_provider(&self, id: ProviderId) -> Result<(), MimsError> {
        if self.providers.get_by_id(id).await?.is_none() {
            return Err(NotFoundError {
                entity: "Provider",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn ensure_assignable(&self, id: UserId) -> Result<(), MimsError> {
        match self.users.get_by_id(id).await? {
            Some(user) if user.active => Ok(()),
            _ => Err(ValidationError::InvalidIdentifier { kind: "assignee" }.into()),
        }
    }

    /// Build an event carrying the case snapshot plus resolved display names.
    async fn event(
        &self,
        kind: EventKind,
        case: &Case,
        actor: &User,
        extra: serde_json::Value,
    ) -> CaseEvent {
        let assignee_name = match case.assignee_id {
            Some(id) => self
                .users
                .get_by_id(id)
                .await
                .ok()
                .flatten()
                .map(|u| u.display_name),
            None => None,
        };
        let case_type_name = match case.case_type_id {
            Some(id) => self
                .case_types
                .get_by_id(id)
                .await
                .ok()
                .flatten()
                .map(|t| t.name),
            None => None,
        };

        let mut data = serde_json::json!({
            "case": case,
            "actor_name": actor.display_name,
            "assignee_name": assignee_name,
            "case_type_name": case_type_name,
        });
        if let (Some(data), serde_json::Value::Object(extra)) = (data.as_object_mut(), extra) {
            data.extend(extra);
        }
        CaseEvent::new(kind, Some(case.id), Some(actor.id), data)
    }

    async fn publish(&self, event: CaseEvent) {
        let kind = event.kind;
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(%err, %kind, "failed to publish case event");
        }
    }

    /// Open a new case.
    ///
    /// SLA deadlines come from the case type, or from the severity defaults
    /// when the type defines none.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] for invalid input or an inactive
    /// case type or assignee, [`MimsError::NotFound`] for an unknown case
    /// type or provider, or a storage error.
    #[tracing::instrument(skip(self, input, actor), fields(actor = %actor.id))]
    pub async fn create_case(&self, input: NewCase, actor: &User) -> Result<Case, MimsError> {
        let case_type = match input.case_type_id {
            Some(id) => Some(self.resolve_case_type(id).await?),
            None => None,
        };
        if let Some(provider_id) = input.provider_id {
            self.ensure_provider(provider_id).await?;
        }
        if let Some(assignee_id) = input.assignee_id {
            self.ensure_assignable(assignee_id).await?;
        }

        let severity = input
            .severity
            .or_else(|| case_type.as_ref().map(|t| t.default_severity))
            .unwrap_or_default();

        let mut builder = Case::builder()
            .title(input.title)
            .severity(severity)
            .reporter_id(actor.id)
            .sla(sla_policy(case_type.as_ref(), severity));
        if let Some(v) = input.description {
            builder = builder.description(v);
        }
        if let Some(t) = &case_type {
            builder = builder.case_type_id(t.id);
        }
        if let Some(v) = input.provider_id {
            builder = builder.provider_id(v);
        }
        if let Some(v) = input.assignee_id {
            builder = builder.assignee_id(v);
        }
        if let Some(v) = input.contact_name {
            builder = builder.contact_name(v);
        }
        if let Some(v) = input.contact_phone {
            builder = builder.contact_phone(v);
        }
        if let Some(v) = input.location {
            builder = builder.location(v);
        }
        let mut case = builder.build()?;

        let mut attempt = 1;
        let case = loop {
            match self.cases.create(case.clone()).await {
                Err(MimsError::Conflict(ConflictError::Duplicate(detail)))
                    if attempt < CREATE_ATTEMPTS =>
                {
                    tracing::warn!(reference = %case.reference, %detail, "case reference taken, retrying");
                    case.regenerate_id();
                    attempt += 1;
                }
                result => break result?,
            }
        };
        self.activities
            .append(CaseActivity::new(case.id, Some(actor.id), ActivityKind::Created))
            .await?;
        tracing::info!(case = %case.reference, "case created");

        let event = self
            .event(EventKind::CaseCreated, &case, actor, serde_json::json!({}))
            .await;
        self.publish(event).await;
        Ok(case)
    }

    /// Look up a case by id.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] when no case with `id` exists,
    /// or a storage error from the repository.
    pub async fn get_case(&self, id: CaseId) -> Result<Case, MimsError> {
        self.cases
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// List cases matching `query` with the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_cases(&self, query: &CaseQuery) -> Result<Page<Case>, MimsError> {
        let at = now();
        let items = self.cases.list(query, at).await?;
        let total = self.cases.count(query, at).await?;
        Ok(Page {
            items,
            total,
            limit: query.limit(),
            offset: query.offset(),
        })
    }

    /// Apply a partial update.
    ///
    /// A change of severity or case type recomputes the SLA deadlines.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown case, case type or
    /// provider, [`MimsError::Validation`] when the case is closed or
    /// cancelled or the result violates invariants, or a storage error.
    #[tracing::instrument(skip(self, update, actor), fields(actor = %actor.id))]
    pub async fn update_case(
        &self,
        id: CaseId,
        update: CaseUpdate,
        actor: &User,
    ) -> Result<Case, MimsError> {
        let mut case = self.get_case(id).await?;
        case.ensure_mutable()?;
        let at = now();
        let mut fields: Vec<String> = Vec::new();

        if let Some(title) = update.title {
            let title = title.trim().to_string();
            if title != case.title {
                case.title = title;
                fields.push("title".into());
            }
        }
        for (name, change, slot) in [
            ("description", update.description, &mut case.description),
            ("contact_name", update.contact_name, &mut case.contact_name),
            ("contact_phone", update.contact_phone, &mut case.contact_phone),
            ("location", update.location, &mut case.location),
        ] {
            if let Some(value) = text_change(change)
                && *slot != value
            {
                *slot = value;
                fields.push(name.into());
            }
        }
        if let Some(provider_id) = update.provider_id
            && provider_id != case.provider_id
        {
            if let Some(provider_id) = provider_id {
                self.ensure_provider(provider_id).await?;
            }
            case.provider_id = provider_id;
            fields.push("provider_id".into());
        }

        let mut sla_changed = false;
        if let Some(case_type_id) = update.case_type_id
            && case_type_id != case.case_type_id
        {
            if let Some(case_type_id) = case_type_id {
                self.resolve_case_type(case_type_id).await?;
            }
            case.case_type_id = case_type_id;
            fields.push("case_type_id".into());
            sla_changed = true;
        }
        let previous_severity = case.severity;
        let severity = update.severity.unwrap_or(previous_severity);
        if severity != previous_severity {
            fields.push("severity".into());
            sla_changed = true;
        }

        if fields.is_empty() {
            return Ok(case);
        }
        if sla_changed {
            let case_type = match case.case_type_id {
                Some(id) => self.case_types.get_by_id(id).await?,
                None => None,
            };
            case.change_severity(severity, sla_policy(case_type.as_ref(), severity), at)?;
        }
        case.validate()?;
        case.updated_at = at;

        let case = self.cases.update(case).await?;
        self.activities
            .append(CaseActivity::new(
                case.id,
                Some(actor.id),
                ActivityKind::Updated {
                    fields: fields.clone(),
                },
            ))
            .await?;
        if severity != previous_severity {
            self.activities
                .append(CaseActivity::new(
                    case.id,
                    Some(actor.id),
                    ActivityKind::SeverityChanged {
                        from: previous_severity,
                        to: severity,
                    },
                ))
                .await?;
        }

        let event = self
            .event(
                EventKind::CaseUpdated,
                &case,
                actor,
                serde_json::json!({ "fields": fields }),
            )
            .await;
        self.publish(event).await;
        Ok(case)
    }

    /// Move a case to another status.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown case,
    /// [`ValidationError::InvalidTransition`] when the move is not allowed,
    /// or a storage error.
    #[tracing::instrument(skip(self, note, actor), fields(actor = %actor.id))]
    pub async fn change_status(
        &self,
        id: CaseId,
        status: CaseStatus,
        note: Option<String>,
        actor: &User,
    ) -> Result<Case, MimsError> {
        let mut case = self.get_case(id).await?;
        let from = case.status;
        case.transition_to(status, now())?;

        let case = self.cases.update(case).await?;
        let activity = CaseActivity::new(
            case.id,
            Some(actor.id),
            ActivityKind::StatusChanged { from, to: status },
        )
        .with_note(note);
        let note = activity.note.clone();
        self.activities.append(activity).await?;
        tracing::info!(case = %case.reference, %from, to = %status, "case status changed");

        let event = self
            .event(
                EventKind::CaseStatusChanged,
                &case,
                actor,
                serde_json::json!({ "from": from, "to": status, "note": note }),
            )
            .await;
        self.publish(event).await;
        Ok(case)
    }

    /// Assign the case to a user, or unassign it with `None`.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown case,
    /// [`MimsError::Validation`] for an unknown or disabled assignee or a
    /// closed case, or a storage error.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn assign(
        &self,
        id: CaseId,
        assignee: Option<UserId>,
        actor: &User,
    ) -> Result<Case, MimsError> {
        let mut case = self.get_case(id).await?;
        if case.assignee_id == assignee {
            return Ok(case);
        }
        if let Some(user_id) = assignee {
            self.ensure_assignable(user_id).await?;
        }

        let from = case.assignee_id;
        let status_change = case.assign(assignee, now())?;
        let case = self.cases.update(case).await?;

        self.activities
            .append(CaseActivity::new(
                case.id,
                Some(actor.id),
                ActivityKind::Assigned { from, to: assignee },
            ))
            .await?;
        if let Some((from, to)) = status_change {
            self.activities
                .append(CaseActivity::new(
                    case.id,
                    Some(actor.id),
                    ActivityKind::StatusChanged { from, to },
                ))
                .await?;
        }

        let event = self
            .event(
                EventKind::CaseAssigned,
                &case,
                actor,
                serde_json::json!({ "from": from, "to": assignee }),
            )
            .await;
        self.publish(event).await;
        Ok(case)
    }

    /// Add a comment to the case timeline.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown case,
    /// [`MimsError::Validation`] for a blank or oversized comment, or a
    /// storage error.
    pub async fn add_comment(
        &self,
        id: CaseId,
        text: &str,
        actor: &User,
    ) -> Result<CaseActivity, MimsError> {
        let mut case = self.get_case(id).await?;
        let activity = CaseActivity::comment(case.id, Some(actor.id), text)?;
        let activity = self.activities.append(activity).await?;

        case.updated_at = activity.created_at;
        let case = self.cases.update(case).await?;

        let event = self
            .event(
                EventKind::CaseCommented,
                &case,
                actor,
                serde_json::json!({ "comment": activity.note }),
            )
            .await;
        self.publish(event).await;
        Ok(activity)
    }

    /// Timeline of a case, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown case, or a storage error.
    pub async fn list_activities(&self, id: CaseId) -> Result<Vec<CaseActivity>, MimsError> {
        self.get_case(id).await?;
        self.activities.list_for_case(id).await
    }

    /// Delete a case and its timeline.
    ///
    /// Attachment bytes are not touched; remove them first through the
    /// attachment service.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown case, or a storage error.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_case(&self, id: CaseId, actor: &User) -> Result<(), MimsError> {
        let case = self.get_case(id).await?;
        let event = self
            .event(EventKind::CaseDeleted, &case, actor, serde_json::json!({}))
            .await;
        self.cases.delete(id).await?;
        tracing::info!(case = %case.reference, "case deleted");
        self.publish(event).await;
        Ok(())
    }

    /// Counts per status and severity plus SLA state of open cases.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, MimsError> {
        let counts = self.cases.counts().await?;
        let open_cases = self.cases.list_open().await?;
        let at = now();

        let mut stats = DashboardStats {
            total: counts.by_status.iter().map(|(_, n)| n).sum(),
            open: open_cases.len() as u64,
            unassigned: open_cases
                .iter()
                .filter(|c| c.assignee_id.is_none())
                .count() as u64,
            by_status: counts
                .by_status
                .iter()
                .map(|(s, n)| (s.as_str(), *n))
                .collect(),
            by_severity: counts
                .by_severity
                .iter()
                .map(|(s, n)| (s.as_str(), *n))
                .collect(),
            ..DashboardStats::default()
        };
        for case in &open_cases {
            match case.sla_status(at) {
                SlaStatus::OnTrack => stats.sla_on_track += 1,
                SlaStatus::AtRisk => stats.sla_at_risk += 1,
                SlaStatus::Breached => stats.sla_breached += 1,
                SlaStatus::None | SlaStatus::Met => {}
            }
        }
        Ok(stats)
    }
}
