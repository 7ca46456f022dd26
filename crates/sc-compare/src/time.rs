//! Timestamp parsing for the alignment join key.
//!
//! Dumps carry ISO-8601 strings in a handful of spellings. Anything that
//! does not parse is not an error: the aligner falls back to matching the
//! raw string.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Width and layout of the last-resort parse.
const FALLBACK_WIDTH: usize = 19;
const FALLBACK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y%m%dT%H%M%S%.f%:z",
    "%Y%m%dT%H%M%S%.f%z",
    "%Y%m%dT%H%M%:z",
    "%Y%m%dT%H%M%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// Parse a dump timestamp to whole epoch seconds.
///
/// Returns `None` for empty input and for strings neither the ISO-8601
/// reading nor the truncated fallback accepts. Times without an offset are
/// taken as UTC. Fractional seconds truncate toward zero.
pub fn parse_epoch_seconds(raw: Option<&str>) -> Option<i64> {
    let raw = raw.filter(|s| !s.is_empty())?;
    parse_iso8601(raw).or_else(|| parse_truncated(raw))
}

fn parse_iso8601(raw: &str) -> Option<i64> {
    let normalized = raw.replace('Z', "+00:00");
    parse_normalized(&normalized)
        .or_else(|| with_minutes(&normalized).and_then(|text| parse_normalized(&text)))
}

fn parse_normalized(text: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(whole_seconds(&dt));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(whole_seconds(&dt));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(whole_seconds(&Utc.from_utc_datetime(&naive)));
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| whole_seconds(&Utc.from_utc_datetime(&naive)))
}

/// Spell out the minutes of an hour-only time: `2024-01-01T10` becomes
/// `2024-01-01T10:00` and `20240101T10` becomes `20240101T1000`. Any
/// offset after the hour is kept.
fn with_minutes(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let (sep, minutes) = match (bytes.get(8), bytes.get(10)) {
        (_, Some(b'T' | b' ')) => (10, ":00"),
        (Some(b'T'), _) => (8, "00"),
        _ => return None,
    };
    let hour_end = sep + 3;
    let hour = bytes.get(sep + 1..hour_end)?;
    if !hour.iter().all(u8::is_ascii_digit) {
        return None;
    }
    match bytes.get(hour_end) {
        None | Some(b'+' | b'-') => Some(format!(
            "{}{}{}",
            &text[..hour_end],
            minutes,
            &text[hour_end..]
        )),
        _ => None,
    }
}

fn parse_truncated(raw: &str) -> Option<i64> {
    let head: String = raw.chars().take(FALLBACK_WIDTH).collect();
    NaiveDateTime::parse_from_str(&head, FALLBACK_FORMAT)
        .ok()
        .map(|naive| whole_seconds(&Utc.from_utc_datetime(&naive)))
}

fn whole_seconds<Tz: TimeZone>(dt: &DateTime<Tz>) -> i64 {
    let seconds = dt.timestamp();
    // chrono floors; the key is truncated toward zero.
    if seconds < 0 && dt.timestamp_subsec_nanos() > 0 {
        seconds + 1
    } else {
        seconds
    }
}
