//! Best-effort timestamp parsing for the `datetime` capture groups.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Formats tried in order for the free-form `datetime` group. BIND's
/// `12-Sep-2025 17:03:56.635` shape comes first since it is the common
/// source for this pipeline.
const DATETIME_FORMATS: &[&str] = &[
    "%d-%b-%Y %H:%M:%S%.3f",
    "%d-%b-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d/%b/%Y:%H:%M:%S",
];

/// Parse a free-form timestamp, interpreting naive date-times in `zone`.
/// Returns epoch seconds, or None when no known shape matches.
pub fn parse_best_effort(value: &str, zone: Tz) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    // Offset-carrying shapes resolve on their own
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.timestamp());
    }

    if let Some(naive) = parse_compact(value) {
        return resolve_local(naive, zone);
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return resolve_local(naive, zone);
        }
    }
    None
}

/// Parse with an operator-supplied chrono format string in `zone`.
pub fn parse_with_layout(value: &str, layout: &str, zone: Tz) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), layout).ok()?;
    resolve_local(naive, zone)
}

/// Compact `YYYYMMDDhhmmss` stamps, as emitted by some resolver exports.
fn parse_compact(value: &str) -> Option<NaiveDateTime> {
    if value.len() != 14 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = value[0..4].parse().ok()?;
    let month: u32 = value[4..6].parse().ok()?;
    let day: u32 = value[6..8].parse().ok()?;
    let hour: u32 = value[8..10].parse().ok()?;
    let minute: u32 = value[10..12].parse().ok()?;
    let second: u32 = value[12..14].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

fn resolve_local(naive: NaiveDateTime, zone: Tz) -> Option<i64> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.timestamp()),
        // DST fold: take the earlier instant
        LocalResult::Ambiguous(dt, _) => Some(dt.timestamp()),
        LocalResult::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn shanghai() -> Tz {
        "Asia/Shanghai".parse().unwrap()
    }

    #[test]
    fn test_bind_style_timestamp() {
        let expected = shanghai()
            .with_ymd_and_hms(2025, 9, 12, 17, 3, 56)
            .unwrap()
            .timestamp();
        assert_eq!(
            parse_best_effort("12-Sep-2025 17:03:56.635", shanghai()),
            Some(expected)
        );
        assert_eq!(
            parse_best_effort("12-Sep-2025 17:03:56", shanghai()),
            Some(expected)
        );
    }

    #[test]
    fn test_iso_and_compact_timestamps() {
        let expected = shanghai()
            .with_ymd_and_hms(2021, 3, 24, 17, 22, 28)
            .unwrap()
            .timestamp();
        assert_eq!(
            parse_best_effort("2021-03-24 17:22:28", shanghai()),
            Some(expected)
        );
        assert_eq!(
            parse_best_effort("20210324172228", shanghai()),
            Some(expected)
        );
    }

    #[test]
    fn test_rfc3339_keeps_own_offset() {
        let expected = Utc
            .with_ymd_and_hms(2025, 9, 12, 9, 3, 56)
            .unwrap()
            .timestamp();
        assert_eq!(
            parse_best_effort("2025-09-12T09:03:56Z", shanghai()),
            Some(expected)
        );
    }

    #[test]
    fn test_garbage_is_none() {
        assert_eq!(parse_best_effort("not a time", shanghai()), None);
        assert_eq!(parse_best_effort("", shanghai()), None);
    }

    #[test]
    fn test_custom_layout() {
        let expected = shanghai()
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .unwrap()
            .timestamp();
        assert_eq!(
            parse_with_layout("02|01|2024 03:04:05", "%d|%m|%Y %H:%M:%S", shanghai()),
            Some(expected)
        );
        assert_eq!(
            parse_with_layout("nope", "%d|%m|%Y %H:%M:%S", shanghai()),
            None
        );
    }
}
