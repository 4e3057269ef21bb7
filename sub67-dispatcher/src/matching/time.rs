use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use regex::Regex;

use sub67_shared::TimeValue;

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid ISO date pattern"));
static TIME_24H: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid 24h pattern"));
static TIME_12H: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})\s*([AaPp][Mm])$").expect("valid 12h pattern"));

const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%Y-%m-%d",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Minutes since midnight for a job start/end time.
///
/// Numbers pass through untouched. Strings must be `H:MM` (24-hour) or
/// `H:MM AM`/`H:MM PM` (12-hour, any case). Everything else is `None`.
pub fn parse_time_to_minutes(value: Option<&TimeValue>) -> Option<i64> {
    match value? {
        TimeValue::Minutes(m) => Some(*m),
        TimeValue::Text(s) => parse_time_text(s.trim()),
    }
}

fn parse_time_text(s: &str) -> Option<i64> {
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = TIME_24H.captures(s) {
        let hour: i64 = caps[1].parse().ok()?;
        let minute: i64 = caps[2].parse().ok()?;
        if hour > 23 || minute > 59 {
            return None;
        }
        return Some(hour * 60 + minute);
    }

    let caps = TIME_12H.captures(s)?;
    let mut hour: i64 = caps[1].parse().ok()?;
    let minute: i64 = caps[2].parse().ok()?;
    if hour > 12 || minute > 59 {
        return None;
    }

    let is_pm = caps[3].eq_ignore_ascii_case("pm");
    if is_pm && hour != 12 {
        hour += 12;
    }
    if !is_pm && hour == 12 {
        hour = 0;
    }
    Some(hour * 60 + minute)
}

/// Canonical `YYYY-MM-DD` form of a job date, in local calendar terms.
///
/// `None` means the date could not be understood; callers must not gate on it.
pub fn normalize_job_date(value: Option<&str>) -> Option<String> {
    let s = value?.trim();
    if s.is_empty() {
        return None;
    }
    if ISO_DATE.is_match(s) {
        return Some(s.to_string());
    }

    parse_loose_date(s)
        .or_else(|| strip_weekday(s).and_then(parse_loose_date))
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn parse_loose_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Local).date_naive());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    {
        return Some(dt.date());
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
}

/// `"Mon, 2/5/2026"` -> `"2/5/2026"`
fn strip_weekday(s: &str) -> Option<&str> {
    let (head, rest) = s.split_once(',')?;
    if head.trim().chars().all(|c| c.is_ascii_alphabetic()) {
        Some(rest.trim())
    } else {
        None
    }
}

/// True when the two ranges share more than an endpoint. Each pair may be
/// given in either order.
pub fn ranges_overlap(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> bool {
    let (a0, a1) = (a_start.min(a_end), a_start.max(a_end));
    let (b0, b1) = (b_start.min(b_end), b_start.max(b_end));
    a0 < b1 && b0 < a1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> TimeValue {
        TimeValue::Text(s.to_string())
    }

    #[test]
    fn parses_twelve_hour_times() {
        assert_eq!(parse_time_to_minutes(Some(&text("12:00 PM"))), Some(720));
        assert_eq!(parse_time_to_minutes(Some(&text("12:00 AM"))), Some(0));
        assert_eq!(parse_time_to_minutes(Some(&text("08:00 AM"))), Some(480));
        assert_eq!(parse_time_to_minutes(Some(&text("3:00 pm"))), Some(900));
        assert_eq!(parse_time_to_minutes(Some(&text("11:59PM"))), Some(1439));
    }

    #[test]
    fn every_twelve_hour_time_lands_within_the_day() {
        for meridiem in ["AM", "PM"] {
            for hour in 1..=12 {
                for minute in 0..60 {
                    let s = format!("{hour}:{minute:02} {meridiem}");
                    let minutes = parse_time_to_minutes(Some(&text(&s))).unwrap();
                    assert!((0..=1439).contains(&minutes), "{s} -> {minutes}");
                }
            }
        }
    }

    #[test]
    fn parses_twenty_four_hour_times() {
        assert_eq!(parse_time_to_minutes(Some(&text("14:30"))), Some(870));
        assert_eq!(parse_time_to_minutes(Some(&text("7:05"))), Some(425));
    }

    #[test]
    fn numbers_pass_through() {
        assert_eq!(parse_time_to_minutes(Some(&TimeValue::Minutes(615))), Some(615));
    }

    #[test]
    fn rejects_other_shapes() {
        assert_eq!(parse_time_to_minutes(None), None);
        for s in ["", "   ", "noon", "8 AM", "08:00:00", "25:00", "13:00 PM", "8:75"] {
            assert_eq!(parse_time_to_minutes(Some(&text(s))), None, "{s}");
        }
    }

    #[test]
    fn iso_dates_are_returned_unchanged() {
        assert_eq!(normalize_job_date(Some("2026-01-06")).as_deref(), Some("2026-01-06"));
        assert_eq!(normalize_job_date(Some(" 2026-01-06 ")).as_deref(), Some("2026-01-06"));
    }

    #[test]
    fn loose_dates_are_normalized() {
        assert_eq!(normalize_job_date(Some("1/6/2026")).as_deref(), Some("2026-01-06"));
        assert_eq!(normalize_job_date(Some("Tue, 1/6/2026")).as_deref(), Some("2026-01-06"));
        assert_eq!(normalize_job_date(Some("January 6, 2026")).as_deref(), Some("2026-01-06"));
        assert_eq!(normalize_job_date(Some("Jan 6 2026")).as_deref(), Some("2026-01-06"));
        assert_eq!(normalize_job_date(Some("2026-01-06T10:00:00")).as_deref(), Some("2026-01-06"));
    }

    #[test]
    fn unparseable_dates_are_none() {
        assert_eq!(normalize_job_date(None), None);
        assert_eq!(normalize_job_date(Some("")), None);
        assert_eq!(normalize_job_date(Some("sometime next week")), None);
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        assert!(!ranges_overlap(100, 200, 200, 300));
        assert!(!ranges_overlap(200, 300, 100, 200));
    }

    #[test]
    fn intersecting_ranges_overlap() {
        assert!(ranges_overlap(100, 200, 150, 250));
        assert!(ranges_overlap(150, 250, 100, 200));
        assert!(ranges_overlap(100, 400, 200, 300));
    }

    #[test]
    fn reversed_endpoints_are_normalized() {
        assert!(ranges_overlap(200, 100, 250, 150));
        assert!(!ranges_overlap(300, 200, 200, 100));
    }
}
