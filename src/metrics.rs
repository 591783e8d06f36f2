use chrono::{Datelike, NaiveDate, Weekday};
use indexmap::IndexMap;

use crate::models::ActivityType;
use crate::week::{day_index, DAYS_IN_WEEK};

/// Share of the daily pace expected on Sundays.
pub const SUNDAY_FACTOR: f64 = 0.7;

pub fn minutes_to_hours(minutes: f64) -> f64 {
    minutes / 60.0
}

/// Realized values in the unit the weekly target is expressed in.
pub fn realized_in_target_units(activity_type: ActivityType, realized: f64) -> f64 {
    match activity_type {
        ActivityType::Time => minutes_to_hours(realized),
        ActivityType::Count => realized,
    }
}

pub fn progress_percentage(realized: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    (realized / target * 100.0).min(100.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Minutes to log today to stay on pace for the weekly target.
///
/// Only time activities get a pace. `daily_values` holds the week's logged
/// minutes by date; only days before `today` count as done. Returns `None` when
/// the target is met, unset, or `today` falls outside the week.
pub fn daily_goal_minutes(
    activity_type: ActivityType,
    target_hours: f64,
    week_start: NaiveDate,
    daily_values: &IndexMap<NaiveDate, f64>,
    today: NaiveDate,
) -> Option<i64> {
    if activity_type != ActivityType::Time || target_hours <= 0.0 {
        return None;
    }
    let today_index = day_index(week_start, today)?;

    let prior_minutes: f64 = daily_values
        .iter()
        .filter(|(date, _)| **date < today)
        .map(|(_, minutes)| *minutes)
        .sum();

    let remaining_minutes = target_hours * 60.0 - prior_minutes;
    if remaining_minutes <= 0.0 {
        return None;
    }

    let mut daily = remaining_minutes / (DAYS_IN_WEEK - today_index) as f64;
    if today.weekday() == Weekday::Sun {
        daily *= SUNDAY_FACTOR;
    }

    // Absorb float noise so 42.000000001 does not round up to 43.
    Some((daily - 1e-9).ceil() as i64)
}

/// Bucket a day's hours into 0..=5 for shading.
pub fn heat_level(hours: f64) -> u8 {
    match hours {
        h if h <= 0.0 => 0,
        h if h < 1.0 => 1,
        h if h < 2.0 => 2,
        h if h < 3.0 => 3,
        h if h < 4.0 => 4,
        _ => 5,
    }
}

/// Shading for one day cell.
///
/// Time cells follow `heat_level`; count cells are measured against the
/// daily share of the weekly target.
pub fn cell_heat(activity_type: ActivityType, value: f64, target_value: f64) -> u8 {
    match activity_type {
        ActivityType::Time => heat_level(minutes_to_hours(value)),
        ActivityType::Count if value <= 0.0 => 0,
        ActivityType::Count if target_value <= 0.0 => 1,
        ActivityType::Count => {
            let share = target_value / DAYS_IN_WEEK as f64;
            match value / share {
                r if r < 0.5 => 1,
                r if r < 1.0 => 2,
                r if r < 1.5 => 3,
                r if r < 2.0 => 4,
                _ => 5,
            }
        }
    }
}
