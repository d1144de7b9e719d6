// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current time in the stored timestamp format.
pub fn now_rfc3339() -> String {
    format_utc_rfc3339(Utc::now())
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Format a calendar date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a 24-hour `HH:MM` wall-clock time.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    if raw.len() != 5 {
        return None;
    }
    NaiveTime::parse_from_str(raw, "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rfc3339_uses_z_suffix() {
        let date = Utc.with_ymd_and_hms(2025, 3, 9, 18, 30, 5).unwrap();
        assert_eq!(format_utc_rfc3339(date), "2025-03-09T18:30:05Z");
    }

    #[test]
    fn test_time_of_day_requires_two_digit_hours() {
        assert!(parse_time_of_day("18:30").is_some());
        assert!(parse_time_of_day("8:30").is_none());
        assert!(parse_time_of_day("24:00").is_none());
        assert!(parse_time_of_day("18:3").is_none());
    }

    #[test]
    fn test_date_round_trip_format() {
        let date = parse_date("2025-10-06").unwrap();
        assert_eq!(format_date(date), "2025-10-06");
        assert!(parse_date("06.10.2025").is_none());
    }
}
