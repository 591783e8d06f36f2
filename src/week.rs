//! Monday-based calendar weeks.

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::MomentumError;

pub static DATE_FORMAT: &str = "%Y-%m-%d";

pub const DAYS_IN_WEEK: usize = 7;

/// The Monday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn week_dates(start: NaiveDate) -> Vec<NaiveDate> {
    (0..DAYS_IN_WEEK as i64)
        .map(|offset| start + Duration::days(offset))
        .collect()
}

pub fn previous_week(start: NaiveDate) -> NaiveDate {
    start - Duration::days(7)
}

pub fn next_week(start: NaiveDate) -> NaiveDate {
    start + Duration::days(7)
}

/// Position of `date` within the week starting at `start`, Monday being 0.
pub fn day_index(start: NaiveDate, date: NaiveDate) -> Option<usize> {
    let offset = date.signed_duration_since(start).num_days();
    if (0..DAYS_IN_WEEK as i64).contains(&offset) {
        Some(offset as usize)
    } else {
        None
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, MomentumError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| MomentumError::invalid(format!("invalid date '{}', use YYYY-MM-DD", raw)))
}

pub fn parse_week_start(raw: &str) -> Result<NaiveDate, MomentumError> {
    let date = parse_date(raw)?;
    if date.weekday().num_days_from_monday() != 0 {
        return Err(MomentumError::invalid(format!(
            "week_start_date {} must be a Monday",
            raw
        )));
    }
    Ok(date)
}

/// "Week of 4 to 10 March", the heading shown above a week.
pub fn week_label(start: NaiveDate) -> String {
    let end = start + Duration::days(6);
    format!("Week of {} to {}", start.day(), end.format("%-d %B"))
}
