//! Tolerant date parsing
//!
//! Records from different pipelines carry native timestamps, ISO strings,
//! US-style dates and free-form month names. Everything normalizes to
//! `YYYY-MM-DD`; a value that cannot be parsed passes through untouched.

use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

const CANONICAL_FORMAT: &str = "%Y-%m-%d";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

// Order matters: month-first wins for ambiguous slash dates.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// A date as found on a record
#[derive(Debug, Clone, PartialEq)]
pub enum DateValue {
    Timestamp(DateTime<Utc>),
    Text(String),
    Missing,
}

impl DateValue {
    /// Interpret a JSON attribute.
    ///
    /// Numbers are epoch milliseconds; `{"$date": ...}` wrappers are unwrapped.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => DateValue::Missing,
            Some(Value::String(s)) => DateValue::Text(s.clone()),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .map(DateValue::Timestamp)
                .unwrap_or_else(|| DateValue::Text(n.to_string())),
            Some(Value::Object(obj)) if obj.contains_key("$date") => {
                DateValue::from_json(obj.get("$date"))
            }
            Some(other) => DateValue::Text(other.to_string()),
        }
    }
}

impl From<DateTime<Utc>> for DateValue {
    fn from(ts: DateTime<Utc>) -> Self {
        DateValue::Timestamp(ts)
    }
}

/// Parse a loosely formatted date into a UTC calendar day
pub fn parse_loose(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    // Compact form only when it is exactly eight digits
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(s, "%Y%m%d").ok();
    }

    None
}

/// Canonical `YYYY-MM-DD` rendering of a calendar day
pub fn format_day(date: NaiveDate) -> String {
    date.format(CANONICAL_FORMAT).to_string()
}

/// Normalize any record date; unparseable text is returned unchanged
pub fn normalize_date(value: &DateValue) -> String {
    match value {
        DateValue::Timestamp(ts) => format_day(ts.date_naive()),
        DateValue::Text(text) => match parse_loose(text) {
            Some(date) => format_day(date),
            None => text.clone(),
        },
        DateValue::Missing => String::new(),
    }
}

/// Parse the requested reconciliation day
pub fn parse_day(day: &str) -> Result<NaiveDate> {
    parse_loose(day).ok_or_else(|| AppError::InvalidDate(format!("cannot parse '{}'", day)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_loose_formats() {
        let expected = ymd(2024, 3, 7);
        for input in [
            "2024-03-07",
            "2024/03/07",
            "03/07/2024",
            "03-07-2024",
            "07.03.2024",
            "2024-03-07T10:15:00Z",
            "2024-03-07T10:15:00.123",
            "2024-03-07 10:15:00",
            "March 7, 2024",
            "Mar 7, 2024",
            "7 March 2024",
            "Thu, 07 Mar 2024 10:15:00 +0000",
            "20240307",
            "  2024-03-07  ",
        ] {
            assert_eq!(parse_loose(input), Some(expected), "input: {}", input);
        }
    }

    #[test]
    fn test_day_first_fallback() {
        // 25 cannot be a month, so the day-first form applies
        assert_eq!(parse_loose("25/12/2024"), Some(ymd(2024, 12, 25)));
    }

    #[test]
    fn test_offsets_convert_to_utc_day() {
        assert_eq!(parse_loose("2024-03-07T23:30:00-05:00"), Some(ymd(2024, 3, 8)));
    }

    #[test]
    fn test_unparseable_values_pass_through() {
        assert_eq!(parse_loose("sometime last week"), None);
        assert_eq!(parse_loose("123"), None);
        assert_eq!(
            normalize_date(&DateValue::Text("Q3 FY24".into())),
            "Q3 FY24".to_string()
        );
        assert_eq!(normalize_date(&DateValue::Missing), "");
    }

    #[test]
    fn test_date_value_from_json() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            DateValue::from_json(Some(&json!(ts.timestamp_millis()))),
            DateValue::Timestamp(ts)
        );
        assert_eq!(
            DateValue::from_json(Some(&json!({"$date": "2024-01-02T03:04:05Z"}))),
            DateValue::Text("2024-01-02T03:04:05Z".into())
        );
        assert_eq!(DateValue::from_json(None), DateValue::Missing);
        assert_eq!(DateValue::from_json(Some(&Value::Null)), DateValue::Missing);
        assert_eq!(normalize_date(&DateValue::Timestamp(ts)), "2024-01-02");
    }

    #[test]
    fn test_parse_day_rejects_garbage() {
        assert_eq!(parse_day("05/01/2024").unwrap(), ymd(2024, 5, 1));
        assert!(matches!(parse_day("13/45/2024"), Err(AppError::InvalidDate(_))));
        assert!(matches!(parse_day(""), Err(AppError::InvalidDate(_))));
    }
}
