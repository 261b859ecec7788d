//! Case status: the lifecycle state machine of a case.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`Case`](super::Case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    #[default]
    New,
    Assigned,
    InProgress,
    Pending,
    Resolved,
    Closed,
    Cancelled,
}

impl CaseStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::New,
        Self::Assigned,
        Self::InProgress,
        Self::Pending,
        Self::Resolved,
        Self::Closed,
        Self::Cancelled,
    ];

    /// Stable wire/storage name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Closed and cancelled cases accept no further changes.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }

    /// A case is open until it is resolved, closed or cancelled.
    #[must_use]
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Resolved | Self::Closed | Self::Cancelled)
    }

    /// Whether moving from `self` to `next` is an allowed transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use CaseStatus::{Assigned, Cancelled, Closed, InProgress, New, Pending, Resolved};

        matches!(
            (self, next),
            (New, Assigned | InProgress | Cancelled)
                | (Assigned, New | InProgress | Pending | Cancelled)
                | (InProgress, Pending | Resolved | Cancelled)
                | (Pending, InProgress | Resolved | Cancelled)
                | (Resolved, Closed | InProgress)
        )
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown case status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for CaseStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_allow_forward_lifecycle() {
        assert!(CaseStatus::New.can_transition_to(CaseStatus::Assigned));
        assert!(CaseStatus::Assigned.can_transition_to(CaseStatus::InProgress));
        assert!(CaseStatus::InProgress.can_transition_to(CaseStatus::Resolved));
        assert!(CaseStatus::Resolved.can_transition_to(CaseStatus::Closed));
    }

    #[test]
    fn should_allow_reopen_when_resolved() {
        assert!(CaseStatus::Resolved.can_transition_to(CaseStatus::InProgress));
    }

    #[test]
    fn should_reject_any_move_out_of_terminal_states() {
        for next in CaseStatus::ALL {
            assert!(!CaseStatus::Closed.can_transition_to(next));
            assert!(!CaseStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn should_reject_same_status_transition() {
        for status in CaseStatus::ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn should_reject_skipping_to_closed_when_not_resolved() {
        assert!(!CaseStatus::New.can_transition_to(CaseStatus::Closed));
        assert!(!CaseStatus::InProgress.can_transition_to(CaseStatus::Closed));
    }

    #[test]
    fn should_report_open_until_resolved() {
        assert!(CaseStatus::Pending.is_open());
        assert!(!CaseStatus::Resolved.is_open());
        assert!(!CaseStatus::Resolved.is_terminal());
        assert!(CaseStatus::Cancelled.is_terminal());
    }

    #[test]
    fn should_roundtrip_through_from_str_and_serde() {
        for status in CaseStatus::ALL {
            assert_eq!(status.as_str().parse::<CaseStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn should_fail_to_parse_unknown_status() {
        assert!("archived".parse::<CaseStatus>().is_err());
    }
}
