//! Case type: a category of case with its own default severity and SLA.

use serde::{Deserialize, Serialize};

use crate::case::{Severity, SlaPolicy};
use crate::error::{MimsError, ValidationError};
use crate::id::CaseTypeId;
use crate::time::{Timestamp, now};
use crate::validate::{max_chars, normalize_optional};

/// A category of case (e.g. "Power outage", "Network incident").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseType {
    pub id: CaseTypeId,
    pub name: String,
    pub description: Option<String>,
    pub default_severity: Severity,
    pub response_sla_minutes: Option<u32>,
    pub resolution_sla_minutes: Option<u32>,
    pub active: bool,
    pub created_at: Timestamp,
}

impl CaseType {
    #[must_use]
    pub fn builder() -> CaseTypeBuilder {
        CaseTypeBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] for a blank name and
    /// [`ValidationError::InvalidSla`] for zero or inverted SLA minutes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        max_chars("name", &self.name, 100)?;
        if self.response_sla_minutes == Some(0) || self.resolution_sla_minutes == Some(0) {
            return Err(ValidationError::InvalidSla);
        }
        if let (Some(response), Some(resolution)) =
            (self.response_sla_minutes, self.resolution_sla_minutes)
            && response > resolution
        {
            return Err(ValidationError::InvalidSla);
        }
        Ok(())
    }

    /// SLA policy for a case of this type at `severity`.
    ///
    /// Targets the type leaves unset fall back to the severity defaults.
    #[must_use]
    pub fn sla_for(&self, severity: Severity) -> SlaPolicy {
        let fallback = severity.default_sla();
        SlaPolicy {
            response_minutes: self
                .response_sla_minutes
                .unwrap_or(fallback.response_minutes),
            resolution_minutes: self
                .resolution_sla_minutes
                .unwrap_or(fallback.resolution_minutes),
        }
    }
}

/// SLA policy for a case, given its optional type.
#[must_use]
pub fn sla_policy(case_type: Option<&CaseType>, severity: Severity) -> SlaPolicy {
    case_type.map_or_else(|| severity.default_sla(), |ct| ct.sla_for(severity))
}

/// Step-by-step builder for [`CaseType`].
#[derive(Debug, Default)]
pub struct CaseTypeBuilder {
    id: Option<CaseTypeId>,
    name: Option<String>,
    description: Option<String>,
    default_severity: Option<Severity>,
    response_sla_minutes: Option<u32>,
    resolution_sla_minutes: Option<u32>,
    active: Option<bool>,
}

impl CaseTypeBuilder {
    #[must_use]
    pub fn id(mut self, id: CaseTypeId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn default_severity(mut self, severity: Severity) -> Self {
        self.default_severity = Some(severity);
        self
    }

    #[must_use]
    pub fn response_sla_minutes(mut self, minutes: u32) -> Self {
        self.response_sla_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn resolution_sla_minutes(mut self, minutes: u32) -> Self {
        self.resolution_sla_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Consume the builder, validate, and return a [`CaseType`].
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if invariants fail.
    pub fn build(self) -> Result<CaseType, MimsError> {
        let case_type = CaseType {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default().trim().to_string(),
            description: normalize_optional(self.description),
            default_severity: self.default_severity.unwrap_or_default(),
            response_sla_minutes: self.response_sla_minutes,
            resolution_sla_minutes: self.resolution_sla_minutes,
            active: self.active.unwrap_or(true),
            created_at: now(),
        };
        case_type.validate()?;
        Ok(case_type)
    }
}
