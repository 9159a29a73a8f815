// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{NaiveDateTime, Timelike};

/// Canonical ledger format for `Start Time` cells.
pub const START_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Formats accepted on input. Garmin reports `startTimeLocal` with a space
/// separator and sometimes a fractional part; the ledger uses `T`.
const ACCEPTED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Format a start time the way the ledger stores it.
pub fn format_start_time(time: NaiveDateTime) -> String {
    time.format(START_TIME_FORMAT).to_string()
}

/// Parse a start time in any of the accepted layouts.
///
/// Fractional seconds are truncated so that the same session reported with
/// and without a fraction maps to the same ledger key.
pub fn parse_start_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|t| t.with_nanosecond(0).unwrap_or(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ledger_format() {
        let t = parse_start_time("2024-01-01T08:00:00").unwrap();
        assert_eq!(format_start_time(t), "2024-01-01T08:00:00");
    }

    #[test]
    fn test_parse_garmin_local_format() {
        let t = parse_start_time("2024-03-05 17:45:12").unwrap();
        assert_eq!(format_start_time(t), "2024-03-05T17:45:12");
    }

    #[test]
    fn test_parse_truncates_fraction() {
        let a = parse_start_time("2024-03-05 17:45:12.0").unwrap();
        let b = parse_start_time("2024-03-05T17:45:12.750").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_start_time("").is_none());
        assert!(parse_start_time("   ").is_none());
        assert!(parse_start_time("yesterday").is_none());
        assert!(parse_start_time("2024-13-01T08:00:00").is_none());
    }
}
