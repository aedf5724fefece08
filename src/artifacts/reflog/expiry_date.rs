//! Expiry dates
//!
//! An expiry date is the point in time before which entries or objects are
//! discarded:
//!
//! - `never` / `false`: 0, nothing is old enough
//! - `now` / `all`: the largest timestamp, everything is old enough
//! - a raw unix timestamp
//! - `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`, in UTC
//! - relative: `90.days.ago`, `2 weeks ago`, `1.week.3.days`
//!
//! Relative units: second, minute, hour, day, week, month (30 days), year
//! (365 days); plurals and the trailing `ago` are optional.

use crate::Timestamp;
use chrono::{NaiveDate, NaiveDateTime};

const MINUTE: Timestamp = 60;
const HOUR: Timestamp = 60 * MINUTE;
const DAY: Timestamp = 24 * HOUR;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpiryDateError {
    #[error("invalid expiry date '{0}'")]
    Invalid(String),

    #[error("unknown time unit '{unit}' in expiry date '{date}'")]
    UnknownUnit { date: String, unit: String },
}

pub fn parse_expiry_date(date: &str, now: Timestamp) -> Result<Timestamp, ExpiryDateError> {
    let normalized = date.trim().to_ascii_lowercase();

    match normalized.as_str() {
        "" => return Err(ExpiryDateError::Invalid(date.to_string())),
        "never" | "false" => return Ok(0),
        "now" | "all" => return Ok(Timestamp::MAX),
        _ => {}
    }

    if normalized.chars().all(|c| c.is_ascii_digit()) {
        return normalized
            .parse()
            .map_err(|_| ExpiryDateError::Invalid(date.to_string()));
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S") {
        return Ok(datetime.and_utc().timestamp());
    }
    if let Ok(day) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        return day
            .and_hms_opt(0, 0, 0)
            .map(|datetime| datetime.and_utc().timestamp())
            .ok_or_else(|| ExpiryDateError::Invalid(date.to_string()));
    }

    parse_relative(date, &normalized).map(|offset| now.saturating_sub(offset))
}

fn parse_relative(date: &str, normalized: &str) -> Result<Timestamp, ExpiryDateError> {
    let mut tokens = normalized
        .split(|c: char| c == '.' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>();

    if tokens.last() == Some(&"ago") {
        tokens.pop();
    }
    if tokens.is_empty() || tokens.len() % 2 != 0 {
        return Err(ExpiryDateError::Invalid(date.to_string()));
    }

    let mut offset: Timestamp = 0;
    for pair in tokens.chunks(2) {
        let count: Timestamp = pair[0]
            .parse()
            .map_err(|_| ExpiryDateError::Invalid(date.to_string()))?;
        let unit = unit_seconds(pair[1]).ok_or_else(|| ExpiryDateError::UnknownUnit {
            date: date.to_string(),
            unit: pair[1].to_string(),
        })?;

        offset = offset.saturating_add(count.saturating_mul(unit));
    }

    Ok(offset)
}

fn unit_seconds(unit: &str) -> Option<Timestamp> {
    let unit = unit.strip_suffix('s').unwrap_or(unit);

    match unit {
        "second" | "sec" => Some(1),
        "minute" | "min" => Some(MINUTE),
        "hour" => Some(HOUR),
        "day" => Some(DAY),
        "week" => Some(7 * DAY),
        "month" => Some(30 * DAY),
        "year" => Some(365 * DAY),
        _ => None,
    }
}
