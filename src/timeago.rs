//! Relative dates as chapter lists print them ("3 days ago", "an hour ago", "yesterday").

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Unit stems and their length in milliseconds. A month is 30 days, a year 365.2425.
const UNITS: &[(&str, i64)] = &[
    ("second", 1_000),
    ("sec", 1_000),
    ("minute", 60_000),
    ("min", 60_000),
    ("hour", 3_600_000),
    ("hr", 3_600_000),
    ("day", 86_400_000),
    ("week", 604_800_000),
    ("month", 2_592_000_000),
    ("year", 31_556_952_000),
];

const ABSOLUTE_FORMATS: &[&str] = &["%B %d, %Y", "%b %d, %Y", "%Y-%m-%d", "%d/%m/%Y", "%d %B %Y"];

/// Resolve `text` against `now`. Falls back to a handful of absolute date formats;
/// `None` when nothing matches.
pub fn parse_time_ago(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    if lower.starts_with("just now") || lower.contains("less than an hour") {
        return Some(now);
    }
    if lower.starts_with("yesterday") {
        return Some(now - Duration::days(1));
    }

    let words: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();
    let unit_ms = words.iter().find_map(|w| unit_of(w));
    if let Some(unit_ms) = unit_ms {
        let count = words
            .iter()
            .find_map(|w| w.parse::<i64>().ok())
            .or_else(|| words.iter().any(|w| matches!(*w, "a" | "an")).then_some(1));
        if let Some(count) = count {
            // Out-of-range offsets (huge or negative counts) resolve to nothing.
            return count
                .checked_mul(unit_ms)
                .and_then(Duration::try_milliseconds)
                .and_then(|ago| now.checked_sub_signed(ago));
        }
    }
    parse_absolute(text.trim())
}

/// Length of the unit named by `word`, singular or plural.
fn unit_of(word: &str) -> Option<i64> {
    let word = word.trim_end_matches('s');
    UNITS
        .iter()
        .find(|(stem, _)| word == *stem)
        .map(|(_, ms)| *ms)
}

fn parse_absolute(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    ABSOLUTE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
