//! Case events: published after every case mutation and fanned out to
//! webhooks and notification templates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::{CaseId, EventId, UserId};
use crate::time::{Timestamp, now};

/// Kind of event, as named on the wire (`case.created`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "case.created")]
    CaseCreated,
    #[serde(rename = "case.updated")]
    CaseUpdated,
    #[serde(rename = "case.status_changed")]
    CaseStatusChanged,
    #[serde(rename = "case.assigned")]
    CaseAssigned,
    #[serde(rename = "case.commented")]
    CaseCommented,
    #[serde(rename = "case.deleted")]
    CaseDeleted,
    /// Synthetic event sent by the "test webhook" action.
    #[serde(rename = "webhook.test")]
    WebhookTest,
}

impl EventKind {
    pub const ALL: [Self; 7] = [
        Self::CaseCreated,
        Self::CaseUpdated,
        Self::CaseStatusChanged,
        Self::CaseAssigned,
        Self::CaseCommented,
        Self::CaseDeleted,
        Self::WebhookTest,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CaseCreated => "case.created",
            Self::CaseUpdated => "case.updated",
            Self::CaseStatusChanged => "case.status_changed",
            Self::CaseAssigned => "case.assigned",
            Self::CaseCommented => "case.commented",
            Self::CaseDeleted => "case.deleted",
            Self::WebhookTest => "webhook.test",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown event name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event {0:?}")]
pub struct UnknownEvent(pub String);

impl FromStr for EventKind {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

/// Something that happened to a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseEvent {
    pub id: EventId,
    #[serde(rename = "event")]
    pub kind: EventKind,
    pub case_id: Option<CaseId>,
    pub actor_id: Option<UserId>,
    pub occurred_at: Timestamp,
    /// Case snapshot and event-specific details.
    pub data: serde_json::Value,
}

impl CaseEvent {
    #[must_use]
    pub fn new(
        kind: EventKind,
        case_id: Option<CaseId>,
        actor_id: Option<UserId>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: EventId::new(),
            kind,
            case_id,
            actor_id,
            occurred_at: now(),
            data,
        }
    }

    /// JSON body posted to webhooks.
    ///
    /// # Errors
    ///
    /// Returns a serialization error (only possible with non-string map keys
    /// inside `data`).
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_use_dotted_names_on_the_wire() {
        let json = serde_json::to_string(&EventKind::CaseStatusChanged).unwrap();
        assert_eq!(json, "\"case.status_changed\"");
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn should_serialize_payload_with_event_field() {
        let case_id = CaseId::new();
        let event = CaseEvent::new(
            EventKind::CaseCreated,
            Some(case_id),
            None,
            serde_json::json!({"title": "Leak"}),
        );
        let payload: serde_json::Value =
            serde_json::from_slice(&event.to_payload().unwrap()).unwrap();
        assert_eq!(payload["event"], "case.created");
        assert_eq!(payload["case_id"], case_id.to_string());
        assert_eq!(payload["data"]["title"], "Leak");
        assert!(payload["occurred_at"].is_string());
    }
}
