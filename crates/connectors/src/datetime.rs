//! Date normalization

use crate::error::ConnectorError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Date used when a caller does not give one
pub const DEFAULT_DATETIME: DateTime<Utc> = DateTime::UNIX_EPOCH;

/// Parse a date string and normalize it to UTC
///
/// Accepts RFC 3339 timestamps with any offset, `YYYY-MM-DD HH:MM:SS` and
/// `YYYY-MM-DD`. The last two carry no offset and are read as UTC.
///
/// # Errors
///
/// Returns `InvalidDate` for anything else.
pub fn parse_datetime(text: &str) -> Result<DateTime<Utc>, ConnectorError> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        && let Some(naive) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(naive.and_utc());
    }

    Err(ConnectorError::InvalidDate(text.to_string()))
}

/// Seconds since the UNIX epoch, with microsecond precision
pub fn unix_seconds(dt: DateTime<Utc>) -> f64 {
    dt.timestamp_micros() as f64 / 1_000_000.0
}
