//! Carry targets and unfinished checklist items into a new week.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use tracing::info;

use crate::db;
use crate::models::{Activity, GoalInput};
use crate::week::previous_week;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RolloverReport {
    pub goals_copied: usize,
    pub activity_goals_copied: usize,
}

/// For each activity, fill in whatever the week is missing from the week before:
/// the weekly target, and the sub-goals that were left incomplete.
pub async fn carry_forward(
    pool: &SqlitePool,
    activities: &[Activity],
    week_start_date: NaiveDate,
) -> Result<RolloverReport> {
    let previous = previous_week(week_start_date);
    let mut report = RolloverReport::default();

    let goals = db::read_goals(pool, Some(week_start_date)).await?;
    let activity_goals = db::read_activity_goals(pool, week_start_date).await?;

    for activity in activities {
        if !goals.iter().any(|g| g.activity_id == activity.id) {
            if let Some(prior) = db::read_goal(pool, activity.id, previous).await? {
                let copy = GoalInput {
                    activity_id: activity.id,
                    week_start_date,
                    target_value: prior.target_value,
                };
                if db::insert_goal_if_absent(pool, &copy).await? {
                    report.goals_copied += 1;
                }
            }
        }

        if !activity_goals.iter().any(|g| g.activity_id == activity.id) {
            let unfinished = db::read_incomplete_activity_goals(pool, activity.id, previous).await?;
            for item in unfinished {
                db::insert_activity_goal(
                    pool,
                    activity.id,
                    week_start_date,
                    &item.goal_text,
                    item.display_order,
                )
                .await?;
                report.activity_goals_copied += 1;
            }
        }
    }

    if report != RolloverReport::default() {
        info!(
            %week_start_date,
            goals_copied = report.goals_copied,
            activity_goals_copied = report.activity_goals_copied,
            "carried previous week forward"
        );
    }

    Ok(report)
}
