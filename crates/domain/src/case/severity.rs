//! Case severity and its default SLA targets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::sla::SlaPolicy;

/// How urgent a case is. Ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// SLA targets used when the case type does not define its own.
    #[must_use]
    pub fn default_sla(self) -> SlaPolicy {
        let (response_minutes, resolution_hours) = match self {
            Self::Low => (240, 72),
            Self::Medium => (120, 24),
            Self::High => (60, 8),
            Self::Critical => (15, 4),
        };
        SlaPolicy {
            response_minutes,
            resolution_minutes: resolution_hours * 60,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown severity name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity {0:?}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|severity| severity.as_str() == s)
            .ok_or_else(|| UnknownSeverity(s.to_string()))
    }
}
