//! SLA policy and evaluation.

use serde::{Deserialize, Serialize};

use crate::time::{Timestamp, after_minutes};

use super::CaseStatus;

/// Share of the resolution window below which an open case is "at risk".
const AT_RISK_REMAINING_PERCENT: i64 = 25;

/// Response and resolution targets, in minutes from case creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaPolicy {
    pub response_minutes: u32,
    pub resolution_minutes: u32,
}

impl SlaPolicy {
    /// Compute `(response_due_at, resolution_due_at)` for a case created at `created_at`.
    #[must_use]
    pub fn deadlines(self, created_at: Timestamp) -> (Timestamp, Timestamp) {
        (
            after_minutes(created_at, self.response_minutes),
            after_minutes(created_at, self.resolution_minutes),
        )
    }
}

/// Where a case stands against its SLA at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    /// No deadline applies (no policy, or the case was cancelled).
    None,
    OnTrack,
    AtRisk,
    Breached,
    /// Resolved before the resolution deadline.
    Met,
}

/// The timestamps SLA evaluation looks at.
#[derive(Debug, Clone, Copy)]
pub struct SlaClock {
    pub status: CaseStatus,
    pub created_at: Timestamp,
    pub response_due_at: Option<Timestamp>,
    pub resolution_due_at: Option<Timestamp>,
    pub first_response_at: Option<Timestamp>,
    pub resolved_at: Option<Timestamp>,
}

impl SlaClock {
    /// Evaluate the SLA state at `now`.
    #[must_use]
    pub fn evaluate(&self, now: Timestamp) -> SlaStatus {
        if self.status == CaseStatus::Cancelled {
            return SlaStatus::None;
        }
        let Some(resolution_due) = self.resolution_due_at else {
            return SlaStatus::None;
        };

        if !self.status.is_open() {
            let finished = self.resolved_at.unwrap_or(now);
            return if finished <= resolution_due {
                SlaStatus::Met
            } else {
                SlaStatus::Breached
            };
        }

        if now > resolution_due {
            return SlaStatus::Breached;
        }
        if let Some(response_due) = self.response_due_at
            && self.first_response_at.is_none()
            && now > response_due
        {
            return SlaStatus::Breached;
        }

        let window = (resolution_due - self.created_at).num_seconds();
        let remaining = (resolution_due - now).num_seconds();
        if window > 0 && remaining * 100 < window * AT_RISK_REMAINING_PERCENT {
            SlaStatus::AtRisk
        } else {
            SlaStatus::OnTrack
        }
    }
}
