//! Card timestamps as displayed on the timeline ("5h", "Jan 24", "Jan 24, 2025").

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use regex::Regex;

static RELATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)\s*([smh])$").unwrap());

static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\s+(\d{1,2})$").unwrap()
});

static MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\s+(\d{1,2}),?\s+(\d{4})$")
        .unwrap()
});

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn local_midnight(offset: &FixedOffset, date: NaiveDate) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Resolve a displayed card time against `reference` (the run time in the
/// viewer's local offset).
///
/// Relative forms subtract from the reference. Dates resolve to local
/// midnight; a date without a year is the most recent such date, so one
/// that would land in the future belongs to the previous year.
pub fn parse_display_time(text: &str, reference: DateTime<FixedOffset>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = RELATIVE.captures(text) {
        let value: i64 = caps[1].parse().ok()?;
        let delta = match caps[2].to_ascii_lowercase().as_str() {
            "s" => Duration::try_seconds(value)?,
            "m" => Duration::try_minutes(value)?,
            _ => Duration::try_hours(value)?,
        };
        return reference
            .with_timezone(&Utc)
            .checked_sub_signed(delta);
    }

    let offset = reference.offset();

    if let Some(caps) = MONTH_DAY_YEAR.captures(text) {
        let month = month_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        return local_midnight(offset, date);
    }

    if let Some(caps) = MONTH_DAY.captures(text) {
        let month = month_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year = reference.year();
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            let candidate = local_midnight(offset, date)?;
            if candidate <= reference.with_timezone(&Utc) {
                return Some(candidate);
            }
        }
        let date = NaiveDate::from_ymd_opt(year - 1, month, day)?;
        return local_midnight(offset, date);
    }

    None
}
