//! Date parsing helpers for keys, filters and record timestamps.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Format of day-level keys (racelist, fixtures).
pub const DAY_FORMAT: &str = "%Y-%m-%d";

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a timestamp that carries an explicit UTC offset.
///
/// Returns `None` for naive timestamps; use `is_naive_timestamp` to tell those
/// apart from garbage.
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(s, format).ok())
}

/// True if `s` is a valid date or datetime without offset information.
pub fn is_naive_timestamp(s: &str) -> bool {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DAY_FORMAT).is_ok()
        || NAIVE_FORMATS
            .iter()
            .any(|format| NaiveDateTime::parse_from_str(s, format).is_ok())
}

/// Parse a day key; full timestamps are accepted and truncated to their date.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DAY_FORMAT)
        .ok()
        .or_else(|| s.get(..10).and_then(|d| NaiveDate::parse_from_str(d, DAY_FORMAT).ok()))
}

pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

/// Midnight UTC at the start of `date`.
pub fn start_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Every day from `start` to `end`, both inclusive.
///
/// An `end` before `start` collapses the range to `start` alone.
pub fn day_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let end = end.max(start);
    let mut days = Vec::new();
    let mut day = start;
    while day <= end {
        days.push(day);
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}
