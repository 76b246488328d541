use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DateError {
    #[error("could not parse date: {0}")]
    Unparseable(String),
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2}):(\d{2})").unwrap())
}

fn ordinal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)(st|nd|rd|th)").unwrap())
}

const DAY_NAMES: [&str; 14] = [
    "Wednesday", "Thursday", "Saturday", "Tuesday", "Monday", "Friday", "Sunday",
    "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun",
];

/// Extract a `HH:MM` time-of-day from free text. `None` when the text
/// carries no time ("TBC" rows).
pub fn extract_time(text: &str) -> Option<String> {
    time_re()
        .captures(text)
        .map(|c| format!("{}:{}", &c[1], &c[2]))
}

/// Parse the date portion of a fixture date/time string.
///
/// Accepted formats, in order: DD/MM/YY (two-digit years pinned into
/// 2000-2099), DD/MM/YYYY, YYYY-MM-DD, DD-MM-YYYY, and sheet-style
/// "Sun 26th Nov" with the current year assumed.
pub fn parse_fixture_date(date_str: &str) -> Option<NaiveDate> {
    let date_part = date_str.split_whitespace().next()?.trim();
    if date_part.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(date_part, "%d/%m/%y") {
        return Some(pin_century(date));
    }
    for format in ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Some(date);
        }
    }

    parse_day_month_date(date_str)
}

/// Two-digit years occasionally arrive mangled by the source markup
/// (e.g. "2510" for 2025), so anything outside 2000-2099 is corrected
/// back into the century using its last two digits.
fn pin_century(date: NaiveDate) -> NaiveDate {
    let year = date.year();
    if (2000..=2099).contains(&year) {
        return date;
    }
    let corrected = 2000 + year.rem_euclid(100);
    debug!(year, corrected, "corrected out-of-century fixture year");
    date.with_year(corrected).unwrap_or(date)
}

/// "Sun 26th Nov" style dates from the weekly sheet: weekday prefix
/// stripped, ordinal suffix stripped, current year assumed.
fn parse_day_month_date(date_str: &str) -> Option<NaiveDate> {
    let mut clean = date_str.trim().to_string();
    for day in DAY_NAMES {
        if clean.to_lowercase().starts_with(&day.to_lowercase()) {
            clean = clean[day.len()..].trim().to_string();
            break;
        }
    }
    let clean = ordinal_re().replace_all(&clean, "$1");

    let current_year = Utc::now().year();
    for format in ["%d %b %Y", "%d %B %Y"] {
        if let Ok(date) =
            NaiveDate::parse_from_str(&format!("{} {}", clean.trim(), current_year), format)
        {
            return Some(date);
        }
    }
    None
}

/// Parse a raw fixture date/time string into a UTC kickoff instant plus
/// the user-facing time text. A date with no time lands at midnight
/// with "TBC" time text; an unparseable date is a hard row error, never
/// silently defaulted to today.
pub fn parse_datetime_text(raw: &str) -> Result<(DateTime<Utc>, String), DateError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DateError::Unparseable(raw.to_string()));
    }

    // ISO datetimes come through the sheet refresher unchanged
    if raw.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00")) {
            let utc = dt.with_timezone(&Utc);
            return Ok((utc, utc.format("%H:%M").to_string()));
        }
    }

    let date = parse_fixture_date(raw).ok_or_else(|| DateError::Unparseable(raw.to_string()))?;

    match extract_time(raw) {
        Some(time_text) => {
            let time = NaiveTime::parse_from_str(&time_text, "%H:%M")
                .map_err(|_| DateError::Unparseable(raw.to_string()))?;
            let naive = NaiveDateTime::new(date, time);
            Ok((
                DateTime::from_naive_utc_and_offset(naive, Utc),
                time_text,
            ))
        }
        None => {
            let naive = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
                DateError::Unparseable(raw.to_string())
            })?;
            Ok((
                DateTime::from_naive_utc_and_offset(naive, Utc),
                "TBC".to_string(),
            ))
        }
    }
}
