//! Date header parsing.

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset};

/// Fallback formats tried after RFC 2822.
const FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S%.f %z",
    "%a, %d %b %Y %H:%M:%S%.f %z",
    "%a, %d %b %Y %H:%M %z",
];

/// Parses a `Date`-style header value.
///
/// Accepts RFC 2822 (a trailing comment such as `(UTC)` is ignored),
/// the same layout with fractional seconds, and RFC 3339.
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] naming `header` if no format matches.
pub fn parse_date(value: &str, header: &str) -> Result<DateTime<FixedOffset>> {
    let trimmed = strip_trailing_comment(value.trim());

    if let Ok(date) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(date);
    }
    for format in FORMATS {
        if let Ok(date) = DateTime::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    DateTime::parse_from_rfc3339(trimmed).map_err(|_| Error::InvalidDate {
        header: header.to_string(),
        value: value.to_string(),
    })
}

/// Parses an `X-OriginalArrivalTime` value.
///
/// Only the part before the `FILETIME` marker is a date; a `(UTC)`
/// annotation stands in for the offset. Returns `Ok(None)` when the marker
/// is missing.
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] if the date part cannot be parsed.
pub fn parse_arrival_time(value: &str) -> Result<Option<DateTime<FixedOffset>>> {
    let Some(ix) = value.find("FILETIME") else {
        return Ok(None);
    };
    let date = value[..ix].replace("(UTC)", "-0000");
    parse_date(&date, "X-OriginalArrivalTime").map(Some)
}

/// Drops a trailing parenthesized comment, e.g. `... +0100 (CET)`.
fn strip_trailing_comment(value: &str) -> &str {
    if value.ends_with(')') {
        if let Some(open) = value.rfind('(') {
            return value[..open].trim_end();
        }
    }
    value
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc2822() {
        let date = parse_date("Mon, 15 Jan 2024 10:30:00 +0000", "Date").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.hour(), 10);
    }

    #[test]
    fn test_parse_with_comment() {
        let date = parse_date("Mon, 15 Jan 2024 10:30:00 +0100 (CET)", "Date").unwrap();
        assert_eq!(date.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_parse_invalid() {
        let err = parse_date("yesterday-ish", "Date").unwrap_err();
        assert!(matches!(err, Error::InvalidDate { ref header, .. } if header == "Date"));
    }

    #[test]
    fn test_arrival_time() {
        let value = "15 Jan 2024 10:30:00.0578 (UTC) FILETIME=[6F24D220:01CCDCF6]";
        let date = parse_arrival_time(value)
            .unwrap()
            .unwrap();
        assert_eq!(date.day(), 15);
        assert_eq!(date.minute(), 30);
        assert_eq!(date.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_arrival_time_without_marker() {
        assert!(parse_arrival_time("15 Jan 2024 10:30:00 (UTC)").unwrap().is_none());
    }
}
