//! Case listing filters and pagination.

use serde::{Deserialize, Serialize};

use crate::id::{CaseTypeId, ProviderId, UserId};
use crate::time::Timestamp;

use super::{Case, CaseStatus, Severity};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_LIMIT: u32 = 50;
/// Largest page size a caller may request.
pub const MAX_LIMIT: u32 = 200;

/// Filters applied when listing cases. All filters are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseQuery {
    pub status: Option<CaseStatus>,
    pub severity: Option<Severity>,
    pub case_type_id: Option<CaseTypeId>,
    pub provider_id: Option<ProviderId>,
    pub assignee_id: Option<UserId>,
    /// Only cases that are still open (not resolved, closed or cancelled).
    pub open_only: bool,
    /// Open cases whose resolution deadline has already passed.
    pub overdue_only: bool,
    /// Substring match on reference, title and description.
    ///
    /// Only ASCII letters are matched case-insensitively; other characters
    /// must match exactly.
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl CaseQuery {
    /// Effective page size, clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// The search term, trimmed, or `None` when blank.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    /// Whether `case` passes every filter, evaluated at `now`.
    #[must_use]
    pub fn matches(&self, case: &Case, now: Timestamp) -> bool {
        if self.status.is_some_and(|status| status != case.status)
            || self.severity.is_some_and(|severity| severity != case.severity)
            || self.case_type_id.is_some_and(|id| Some(id) != case.case_type_id)
            || self.provider_id.is_some_and(|id| Some(id) != case.provider_id)
            || self.assignee_id.is_some_and(|id| Some(id) != case.assignee_id)
        {
            return false;
        }
        if (self.open_only || self.overdue_only) && !case.status.is_open() {
            return false;
        }
        if self.overdue_only && !case.resolution_due_at.is_some_and(|due| due < now) {
            return false;
        }
        if let Some(term) = self.search_term() {
            let term = term.to_ascii_lowercase();
            let hit = case.reference.to_ascii_lowercase().contains(&term)
                || case.title.to_ascii_lowercase().contains(&term)
                || case
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_ascii_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_limit_when_missing() {
        assert_eq!(CaseQuery::default().limit(), DEFAULT_LIMIT);
        assert_eq!(CaseQuery::default().offset(), 0);
    }

    #[test]
    fn should_clamp_limit_into_allowed_range() {
        let query = CaseQuery {
            limit: Some(10_000),
            ..CaseQuery::default()
        };
        assert_eq!(query.limit(), MAX_LIMIT);

        let query = CaseQuery {
            limit: Some(0),
            ..CaseQuery::default()
        };
        assert_eq!(query.limit(), 1);
    }

    #[test]
    fn should_ignore_blank_search() {
        let query = CaseQuery {
            search: Some("   ".to_string()),
            ..CaseQuery::default()
        };
        assert_eq!(query.search_term(), None);
    }

    #[test]
    fn should_match_search_on_title_case_insensitively() {
        let case = Case::builder().title("Water LEAK in lobby").build().unwrap();
        let query = CaseQuery {
            search: Some("leak".to_string()),
            ..CaseQuery::default()
        };
        assert!(query.matches(&case, case.created_at));

        let query = CaseQuery {
            search: Some("fire".to_string()),
            ..CaseQuery::default()
        };
        assert!(!query.matches(&case, case.created_at));
    }

    #[test]
    fn should_fold_only_ascii_letters_in_search() {
        let case = Case::builder().title("ÉTAGE 3 fuite").build().unwrap();
        let search = |term: &str| CaseQuery {
            search: Some(term.to_string()),
            ..CaseQuery::default()
        };
        assert!(search("Étage").matches(&case, case.created_at));
        assert!(search("FUITE").matches(&case, case.created_at));
        assert!(!search("étage").matches(&case, case.created_at));
    }

    #[test]
    fn should_match_overdue_only_past_resolution_deadline() {
        let case = Case::builder()
            .title("Broken lift")
            .severity(Severity::Critical)
            .build()
            .unwrap();
        let query = CaseQuery {
            overdue_only: true,
            ..CaseQuery::default()
        };
        assert!(!query.matches(&case, case.created_at));
        assert!(query.matches(&case, case.created_at + chrono::Duration::hours(5)));
    }

    #[test]
    fn should_exclude_closed_cases_when_open_only() {
        let mut case = Case::builder().title("t").build().unwrap();
        let at = case.created_at;
        case.transition_to(CaseStatus::Cancelled, at).unwrap();
        let query = CaseQuery {
            open_only: true,
            ..CaseQuery::default()
        };
        assert!(!query.matches(&case, at));
        assert!(CaseQuery::default().matches(&case, at));
    }
}
