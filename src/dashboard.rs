//! Everything needed to draw one week: per-activity rows plus a time summary.

use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use crate::db;
use crate::metrics::{
    daily_goal_minutes, progress_percentage, realized_in_target_units, round2,
};
use crate::models::{ActivityGoal, ActivityType, EntryFilter, Id};
use crate::rollover;
use crate::week::{week_dates, week_label};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyDashboard {
    pub week_start_date: NaiveDate,
    pub week_label: String,
    pub week_dates: Vec<NaiveDate>,
    pub activities: Vec<ActivitySummary>,
    pub weekly_summary: WeeklySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub activity_id: Id,
    pub name: String,
    pub activity_type: ActivityType,
    pub target_unit: String,
    pub target_value: f64,
    /// Sum of the week's entries in stored units (minutes for time activities).
    pub realized_value: f64,
    pub realized_hours: Option<f64>,
    pub progress_percentage: f64,
    pub reflection_text: String,
    pub daily_values: IndexMap<NaiveDate, f64>,
    pub goals: Vec<ActivityGoal>,
    pub daily_goal_minutes: Option<i64>,
}

/// Totals over time activities only; counts don't add up with hours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub total_target_hours: f64,
    pub total_realized_hours: f64,
    pub overall_percentage: f64,
}

pub async fn load_week(
    pool: &SqlitePool,
    week_start_date: NaiveDate,
    today: NaiveDate,
) -> Result<WeeklyDashboard> {
    let dates = week_dates(week_start_date);
    let activities = db::read_active_activities(pool).await?;

    rollover::carry_forward(pool, &activities, week_start_date).await?;

    let entries = db::read_entries_between(pool, dates[0], dates[6]).await?;
    let targets: HashMap<Id, f64> = db::read_goals(pool, Some(week_start_date))
        .await?
        .into_iter()
        .map(|g| (g.activity_id, g.target_value))
        .collect();
    let mut reflections: HashMap<Id, String> = db::read_reflections(pool, Some(week_start_date))
        .await?
        .into_iter()
        .map(|r| (r.activity_id, r.reflection_text))
        .collect();
    let mut checklist: HashMap<Id, Vec<ActivityGoal>> = HashMap::new();
    for goal in db::read_activity_goals(pool, week_start_date).await? {
        checklist.entry(goal.activity_id).or_default().push(goal);
    }

    let mut summary = WeeklySummary::default();
    let mut rows = Vec::with_capacity(activities.len());

    for activity in activities {
        let mut daily_values: IndexMap<NaiveDate, f64> =
            dates.iter().map(|d| (*d, 0.0)).collect();
        for entry in entries.iter().filter(|e| e.activity_id == activity.id) {
            if let Some(value) = daily_values.get_mut(&entry.entry_date) {
                *value = entry.value_amount;
            }
        }

        let realized_value: f64 = daily_values.values().sum();
        let target_value = targets.get(&activity.id).copied().unwrap_or(0.0);
        let realized = realized_in_target_units(activity.activity_type, realized_value);

        let realized_hours = match activity.activity_type {
            ActivityType::Time => {
                summary.total_target_hours += target_value;
                summary.total_realized_hours += realized;
                Some(round2(realized))
            }
            ActivityType::Count => None,
        };

        rows.push(ActivitySummary {
            activity_id: activity.id,
            daily_goal_minutes: daily_goal_minutes(
                activity.activity_type,
                target_value,
                week_start_date,
                &daily_values,
                today,
            ),
            name: activity.name,
            activity_type: activity.activity_type,
            target_unit: activity.target_unit,
            target_value,
            realized_value,
            realized_hours,
            progress_percentage: round2(progress_percentage(realized, target_value)),
            reflection_text: reflections.remove(&activity.id).unwrap_or_default(),
            daily_values,
            goals: checklist.remove(&activity.id).unwrap_or_default(),
        });
    }

    summary.overall_percentage = round2(progress_percentage(
        summary.total_realized_hours,
        summary.total_target_hours,
    ));
    summary.total_realized_hours = round2(summary.total_realized_hours);

    Ok(WeeklyDashboard {
        week_start_date,
        week_label: week_label(week_start_date),
        week_dates: dates,
        activities: rows,
        weekly_summary: summary,
    })
}

/// Pacing for a single activity, as the stopwatch shows it.
pub async fn daily_goal_for(
    pool: &SqlitePool,
    activity_id: Id,
    week_start_date: NaiveDate,
    today: NaiveDate,
) -> Result<Option<i64>> {
    let activity = db::read_activity(pool, activity_id).await?;
    rollover::carry_forward(pool, std::slice::from_ref(&activity), week_start_date).await?;

    let dates = week_dates(week_start_date);
    let target = db::read_goal(pool, activity_id, week_start_date)
        .await?
        .map_or(0.0, |g| g.target_value);

    let mut daily_values: IndexMap<NaiveDate, f64> = dates.iter().map(|d| (*d, 0.0)).collect();
    let filter = EntryFilter {
        activity_id: Some(activity_id),
        start_date: Some(dates[0]),
        end_date: Some(dates[6]),
    };
    for entry in db::read_entries(pool, &filter).await? {
        daily_values.insert(entry.entry_date, entry.value_amount);
    }

    Ok(daily_goal_minutes(
        activity.activity_type,
        target,
        week_start_date,
        &daily_values,
        today,
    ))
}
