//! Timestamp utilities
//!
//! All timestamps are stored as RFC 3339 strings in UTC with a fixed
//! microsecond precision, so lexicographic order equals chronological order.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current UTC timestamp formatted for storage
pub fn now_rfc3339() -> String {
    format_timestamp(&now())
}

/// Parse a stored RFC 3339 timestamp
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a report boundary supplied by a client
///
/// Accepts either a full RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
/// A bare start date means the beginning of that day; a bare end date means
/// the end of that day.
pub fn parse_boundary(value: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    if let Some(dt) = parse_rfc3339(value) {
        return Some(dt);
    }

    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)?
    } else {
        date.and_hms_opt(0, 0, 0)?
    };
    Some(time.and_utc())
}
