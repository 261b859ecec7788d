//! Timestamps and the minute arithmetic used by SLA deadlines.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// UTC timestamp used for case deadlines, sessions and event times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// `start` shifted by a whole number of minutes.
#[must_use]
pub fn after_minutes(start: Timestamp, minutes: u32) -> Timestamp {
    start + Duration::minutes(i64::from(minutes))
}

/// Canonical text form: RFC 3339, microsecond precision, `Z` suffix.
///
/// Lexicographic order of the output matches chronological order, so it can
/// be compared as plain text by storage backends.
#[must_use]
pub fn to_canonical(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
