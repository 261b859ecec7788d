//! Case: a trackable support issue with status, severity and SLA deadlines.

mod query;
mod severity;
mod sla;
mod status;

pub use query::{CaseQuery, DEFAULT_LIMIT, MAX_LIMIT, Page};
pub use severity::{Severity, UnknownSeverity};
pub use sla::{SlaClock, SlaPolicy, SlaStatus};
pub use status::{CaseStatus, UnknownStatus};

use serde::{Deserialize, Serialize};

use crate::error::{MimsError, ValidationError};
use crate::id::{CaseId, CaseTypeId, ProviderId, UserId};
use crate::time::{Timestamp, now};
use crate::validate::{max_chars, normalize_optional};

/// Longest accepted case title, in characters.
pub const MAX_TITLE_CHARS: usize = 200;
/// Longest accepted case description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 10_000;

/// A support case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    /// Human readable reference such as `C260301-4F2A9C`.
    pub reference: String,
    pub title: String,
    pub description: Option<String>,
    pub case_type_id: Option<CaseTypeId>,
    pub provider_id: Option<ProviderId>,
    pub status: CaseStatus,
    pub severity: Severity,
    pub assignee_id: Option<UserId>,
    pub reporter_id: Option<UserId>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub location: Option<String>,
    pub response_due_at: Option<Timestamp>,
    pub resolution_due_at: Option<Timestamp>,
    pub first_response_at: Option<Timestamp>,
    pub resolved_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Build the human readable reference for a case.
#[must_use]
pub fn make_reference(id: CaseId, created_at: Timestamp) -> String {
    let hex = id.as_uuid().simple().to_string();
    format!(
        "C{}-{}",
        created_at.format("%y%m%d"),
        hex[..6].to_ascii_uppercase()
    )
}

impl Case {
    /// Create a builder for constructing a [`Case`].
    #[must_use]
    pub fn builder() -> CaseBuilder {
        CaseBuilder::default()
    }

    /// Give the case a fresh id and the reference derived from it.
    ///
    /// Used when the stored reference space already holds this reference.
    pub fn regenerate_id(&mut self) {
        self.id = CaseId::new();
        self.reference = make_reference(self.id, self.created_at);
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyTitle`] when the title is blank, or
    /// [`ValidationError::TooLong`] when title or description exceed limits.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        max_chars("title", &self.title, MAX_TITLE_CHARS)?;
        if let Some(description) = &self.description {
            max_chars("description", description, MAX_DESCRIPTION_CHARS)?;
        }
        Ok(())
    }

    /// Snapshot of the timestamps used for SLA evaluation.
    #[must_use]
    pub fn sla_clock(&self) -> SlaClock {
        SlaClock {
            status: self.status,
            created_at: self.created_at,
            response_due_at: self.response_due_at,
            resolution_due_at: self.resolution_due_at,
            first_response_at: self.first_response_at,
            resolved_at: self.resolved_at,
        }
    }

    /// SLA state of this case at `at`.
    #[must_use]
    pub fn sla_status(&self, at: Timestamp) -> SlaStatus {
        self.sla_clock().evaluate(at)
    }

    /// Apply an SLA policy, computing deadlines from the creation time.
    pub fn apply_sla(&mut self, policy: SlaPolicy) {
        let (response, resolution) = policy.deadlines(self.created_at);
        self.response_due_at = Some(response);
        self.resolution_due_at = Some(resolution);
    }

    /// Move the case to `next`, recording lifecycle timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTransition`] when the move is not
    /// allowed from the current status.
    pub fn transition_to(&mut self, next: CaseStatus, at: Timestamp) -> Result<(), ValidationError> {
        let current = self.status;
        if !current.can_transition_to(next) {
            return Err(ValidationError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        if current == CaseStatus::New && self.first_response_at.is_none() {
            self.first_response_at = Some(at);
        }
        match next {
            CaseStatus::Resolved => self.resolved_at = Some(at),
            CaseStatus::Closed => self.closed_at = Some(at),
            CaseStatus::InProgress if current == CaseStatus::Resolved => self.resolved_at = None,
            _ => {}
        }

        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    /// Change the assignee.
    ///
    /// Assigning a `new` case moves it to `assigned`; unassigning an
    /// `assigned` case moves it back to `new`. Returns the status change,
    /// if any, as `(from, to)`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TerminalCase`] when the case is closed or
    /// cancelled.
    pub fn assign(
        &mut self,
        assignee: Option<UserId>,
        at: Timestamp,
    ) -> Result<Option<(CaseStatus, CaseStatus)>, ValidationError> {
        self.ensure_mutable()?;

        let previous = self.status;
        let next = match (previous, assignee) {
            (CaseStatus::New, Some(_)) => Some(CaseStatus::Assigned),
            (CaseStatus::Assigned, None) => Some(CaseStatus::New),
            _ => None,
        };

        self.assignee_id = assignee;
        self.updated_at = at;
        if let Some(next) = next {
            self.transition_to(next, at)?;
            return Ok(Some((previous, next)));
        }
        Ok(None)
    }

    /// Change severity and recompute SLA deadlines with `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TerminalCase`] when the case is closed or
    /// cancelled.
    pub fn change_severity(
        &mut self,
        severity: Severity,
        policy: SlaPolicy,
        at: Timestamp,
    ) -> Result<(), ValidationError> {
        self.ensure_mutable()?;
        self.severity = severity;
        self.apply_sla(policy);
        self.updated_at = at;
        Ok(())
    }

    /// Reject modifications of closed or cancelled cases.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TerminalCase`] when the status is terminal.
    pub fn ensure_mutable(&self) -> Result<(), ValidationError> {
        if self.status.is_terminal() {
            return Err(ValidationError::TerminalCase {
                status: self.status,
            });
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Case`].
#[derive(Debug, Default)]
pub struct CaseBuilder {
    id: Option<CaseId>,
    title: Option<String>,
    description: Option<String>,
    case_type_id: Option<CaseTypeId>,
    provider_id: Option<ProviderId>,
    severity: Option<Severity>,
    assignee_id: Option<UserId>,
    reporter_id: Option<UserId>,
    contact_name: Option<String>,
    contact_phone: Option<String>,
    location: Option<String>,
    sla: Option<SlaPolicy>,
    created_at: Option<Timestamp>,
}

impl CaseBuilder {
    #[must_use]
    pub fn id(mut self, id: CaseId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn case_type_id(mut self, case_type_id: CaseTypeId) -> Self {
        self.case_type_id = Some(case_type_id);
        self
    }

    #[must_use]
    pub fn provider_id(mut self, provider_id: ProviderId) -> Self {
        self.provider_id = Some(provider_id);
        self
    }

    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn assignee_id(mut self, assignee_id: UserId) -> Self {
        self.assignee_id = Some(assignee_id);
        self
    }

    #[must_use]
    pub fn reporter_id(mut self, reporter_id: UserId) -> Self {
        self.reporter_id = Some(reporter_id);
        self
    }

    #[must_use]
    pub fn contact_name(mut self, contact_name: impl Into<String>) -> Self {
        self.contact_name = Some(contact_name.into());
        self
    }

    #[must_use]
    pub fn contact_phone(mut self, contact_phone: impl Into<String>) -> Self {
        self.contact_phone = Some(contact_phone.into());
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// SLA policy to apply. Without one the severity defaults are used.
    #[must_use]
    pub fn sla(mut self, sla: SlaPolicy) -> Self {
        self.sla = Some(sla);
        self
    }

    #[must_use]
    pub fn created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Consume the builder, validate, and return a [`Case`].
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if the title is missing, blank or
    /// too long.
    pub fn build(self) -> Result<Case, MimsError> {
        let id = self.id.unwrap_or_default();
        let created_at = self.created_at.unwrap_or_else(now);
        let severity = self.severity.unwrap_or_default();
        let status = if self.assignee_id.is_some() {
            CaseStatus::Assigned
        } else {
            CaseStatus::New
        };

        let mut case = Case {
            id,
            reference: make_reference(id, created_at),
            title: self.title.unwrap_or_default().trim().to_string(),
            description: normalize_optional(self.description),
            case_type_id: self.case_type_id,
            provider_id: self.provider_id,
            status,
            severity,
            assignee_id: self.assignee_id,
            reporter_id: self.reporter_id,
            contact_name: normalize_optional(self.contact_name),
            contact_phone: normalize_optional(self.contact_phone),
            location: normalize_optional(self.location),
            response_due_at: None,
            resolution_due_at: None,
            first_response_at: None,
            resolved_at: None,
            closed_at: None,
            created_at,
            updated_at: created_at,
        };
        case.apply_sla(self.sla.unwrap_or_else(|| severity.default_sla()));
        case.validate()?;
        Ok(case)
    }
}
