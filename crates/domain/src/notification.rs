//! Notification outbox: LINE messages queued for delivery by a worker.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MimsError, ValidationError};
use crate::id::{CaseId, LineChannelId, NotificationId, TemplateId};
use crate::template::MAX_BODY_CHARS;
use crate::time::{Timestamp, now};
use crate::validate::max_chars;

/// Delivery attempts before an outbox row is marked failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const MAX_ERROR_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub const ALL: [Self; 3] = [Self::Pending, Self::Sent, Self::Failed];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown notification status {0:?}")]
pub struct UnknownNotificationStatus(pub String);

impl FromStr for NotificationStatus {
    type Err = UnknownNotificationStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownNotificationStatus(s.to_string()))
    }
}

/// One queued push message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub channel_id: LineChannelId,
    /// LINE user, group or room id.
    pub target: String,
    pub message: String,
    pub case_id: Option<CaseId>,
    pub template_id: Option<TemplateId>,
    pub status: NotificationStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub sent_at: Option<Timestamp>,
}

impl Notification {
    /// Queue a new pending message.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyTarget`], [`ValidationError::EmptyMessage`]
    /// or [`ValidationError::TooLong`].
    pub fn pending(
        channel_id: LineChannelId,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self, MimsError> {
        let target = target.into().trim().to_string();
        let message = message.into();
        if target.is_empty() {
            return Err(ValidationError::EmptyTarget.into());
        }
        if message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        max_chars("message", &message, MAX_BODY_CHARS)?;
        Ok(Self {
            id: NotificationId::new(),
            channel_id,
            target,
            message,
            case_id: None,
            template_id: None,
            status: NotificationStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now(),
            sent_at: None,
        })
    }

    /// Link the row to the case it reports on, if any.
    ///
    /// The link is informational: the row outlives the case.
    #[must_use]
    pub fn for_case(mut self, case_id: Option<CaseId>) -> Self {
        self.case_id = case_id;
        self
    }

    #[must_use]
    pub fn from_template(mut self, template_id: TemplateId) -> Self {
        self.template_id = Some(template_id);
        self
    }

    /// Record a delivery attempt.
    ///
    /// A failure keeps the row pending until `max_attempts` is reached.
    pub fn record_outcome(&mut self, result: Result<(), String>, max_attempts: u32) {
        self.attempts = self.attempts.saturating_add(1);
        match result {
            Ok(()) => {
                self.status = NotificationStatus::Sent;
                self.sent_at = Some(now());
                self.last_error = None;
            }
            Err(mut error) => {
                if let Some((idx, _)) = error.char_indices().nth(MAX_ERROR_CHARS) {
                    error.truncate(idx);
                }
                self.last_error = Some(error);
                if self.attempts >= max_attempts.max(1) {
                    self.status = NotificationStatus::Failed;
                }
            }
        }
    }

    /// Put a failed row back in the queue with a fresh attempt budget.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NotRequeueable`] unless the row failed.
    pub fn requeue(&mut self) -> Result<(), ValidationError> {
        if self.status != NotificationStatus::Failed {
            return Err(ValidationError::NotRequeueable);
        }
        self.status = NotificationStatus::Pending;
        self.attempts = 0;
        Ok(())
    }
}
