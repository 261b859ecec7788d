//! Case activity: the append-only timeline of a case.

use serde::{Deserialize, Serialize};

use crate::case::{CaseStatus, Severity};
use crate::error::{MimsError, ValidationError};
use crate::id::{ActivityId, AttachmentId, CaseId, UserId};
use crate::time::{Timestamp, now};
use crate::validate::max_chars;

/// Longest accepted comment, in characters.
pub const MAX_NOTE_CHARS: usize = 5_000;

/// What happened to the case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityKind {
    Created,
    Updated {
        fields: Vec<String>,
    },
    StatusChanged {
        from: CaseStatus,
        to: CaseStatus,
    },
    Assigned {
        from: Option<UserId>,
        to: Option<UserId>,
    },
    SeverityChanged {
        from: Severity,
        to: Severity,
    },
    Commented,
    AttachmentAdded {
        attachment_id: AttachmentId,
        file_name: String,
    },
    AttachmentRemoved {
        attachment_id: AttachmentId,
        file_name: String,
    },
}

impl ActivityKind {
    /// Short name used for storage and filtering.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated { .. } => "updated",
            Self::StatusChanged { .. } => "status_changed",
            Self::Assigned { .. } => "assigned",
            Self::SeverityChanged { .. } => "severity_changed",
            Self::Commented => "commented",
            Self::AttachmentAdded { .. } => "attachment_added",
            Self::AttachmentRemoved { .. } => "attachment_removed",
        }
    }
}

/// One entry in a case timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseActivity {
    pub id: ActivityId,
    pub case_id: CaseId,
    pub actor_id: Option<UserId>,
    pub kind: ActivityKind,
    pub note: Option<String>,
    pub created_at: Timestamp,
}

impl CaseActivity {
    /// Record `kind` on `case_id`, performed by `actor_id`.
    #[must_use]
    pub fn new(case_id: CaseId, actor_id: Option<UserId>, kind: ActivityKind) -> Self {
        Self {
            id: ActivityId::new(),
            case_id,
            actor_id,
            kind,
            note: None,
            created_at: now(),
        }
    }

    /// Attach a free-text note.
    #[must_use]
    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self
    }

    /// A comment on the case.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyMessage`] for a blank comment or
    /// [`ValidationError::TooLong`] past [`MAX_NOTE_CHARS`].
    pub fn comment(
        case_id: CaseId,
        actor_id: Option<UserId>,
        text: &str,
    ) -> Result<Self, MimsError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        max_chars("comment", text, MAX_NOTE_CHARS)?;
        Ok(Self::new(case_id, actor_id, ActivityKind::Commented).with_note(Some(text.to_string())))
    }
}
