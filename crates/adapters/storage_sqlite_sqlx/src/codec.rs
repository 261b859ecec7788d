//! Column encoding helpers shared by the repositories.
//!
//! Timestamps are stored in their canonical text form so that range filters
//! can compare them as strings.

use std::error::Error;
use std::str::FromStr;

use mims_domain::time::{Timestamp, to_canonical};

pub(crate) fn ts(value: Timestamp) -> String {
    to_canonical(value)
}

pub(crate) fn opt_ts(value: Option<Timestamp>) -> Option<String> {
    value.map(ts)
}

pub(crate) fn decode_err<E>(err: E) -> sqlx::Error
where
    E: Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

pub(crate) fn parse_ts(raw: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|value| value.to_utc())
        .map_err(decode_err)
}

pub(crate) fn parse_opt_ts(raw: Option<String>) -> Result<Option<Timestamp>, sqlx::Error> {
    raw.as_deref().map(parse_ts).transpose()
}

/// Parse an id or enum stored as text.
pub(crate) fn parse<T>(raw: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: Error + Send + Sync + 'static,
{
    T::from_str(raw).map_err(decode_err)
}

pub(crate) fn parse_opt<T>(raw: Option<String>) -> Result<Option<T>, sqlx::Error>
where
    T: FromStr,
    T::Err: Error + Send + Sync + 'static,
{
    raw.as_deref().map(parse::<T>).transpose()
}

/// Saturating conversion for counters bound as `INTEGER`.
pub(crate) fn int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn uint(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_round_trip_timestamps_at_microsecond_precision() {
        let now = mims_domain::time::now();
        let parsed = parse_ts(&ts(now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
        assert!(ts(now).ends_with('Z'));
    }

    #[test]
    fn should_report_decode_error_for_bad_id() {
        let result = parse::<mims_domain::id::CaseId>("not-a-uuid");
        assert!(matches!(result, Err(sqlx::Error::Decode(_))));
    }
}
