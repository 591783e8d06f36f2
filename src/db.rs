use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};

use crate::error::MomentumError;
use crate::models::{
    Activity, ActivityGoal, ActivityUpdate, DailyEntry, EntryFilter, EntryInput, GoalInput, Id,
    NewActivity, NewActivityGoal, ReflectionInput, WeeklyGoal, WeeklyReflection,
};
use crate::timer::TimerSync;
use crate::week::week_start;

const SCHEMA: [&str; 6] = [
    "CREATE TABLE IF NOT EXISTS activities (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        activity_type TEXT NOT NULL DEFAULT 'time',
        target_unit TEXT NOT NULL DEFAULT 'hours',
        display_order INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS daily_entries (
        id INTEGER PRIMARY KEY,
        activity_id INTEGER NOT NULL REFERENCES activities(id),
        entry_date TEXT NOT NULL,
        value_amount REAL NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        UNIQUE (activity_id, entry_date)
    )",
    "CREATE TABLE IF NOT EXISTS weekly_goals (
        id INTEGER PRIMARY KEY,
        activity_id INTEGER NOT NULL REFERENCES activities(id),
        week_start_date TEXT NOT NULL,
        target_value REAL NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        UNIQUE (activity_id, week_start_date)
    )",
    "CREATE TABLE IF NOT EXISTS weekly_reflections (
        id INTEGER PRIMARY KEY,
        activity_id INTEGER NOT NULL REFERENCES activities(id),
        week_start_date TEXT NOT NULL,
        reflection_text TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        UNIQUE (activity_id, week_start_date)
    )",
    "CREATE TABLE IF NOT EXISTS activity_goals (
        id INTEGER PRIMARY KEY,
        activity_id INTEGER NOT NULL REFERENCES activities(id),
        week_start_date TEXT NOT NULL,
        goal_text TEXT NOT NULL,
        completed BOOLEAN NOT NULL DEFAULT 0,
        completed_at TEXT,
        display_order INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS timer_sync (
        activity_id INTEGER NOT NULL REFERENCES activities(id),
        for_date TEXT NOT NULL,
        is_active BOOLEAN NOT NULL,
        start_time TEXT,
        paused_seconds INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (activity_id, for_date)
    )",
];

pub async fn setup_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid DATABASE_URL: {}", database_url))?
        .create_if_missing(true);

    Ok(SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?)
}

/// Create the tables if they don't already exist.
pub async fn setup_db(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA.iter() {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to create schema")?;
    }
    Ok(())
}

// Activities

pub async fn write_activity(pool: &SqlitePool, activity: &NewActivity) -> Result<Activity> {
    activity.validate()?;

    let (next_order,): (i64,) =
        sqlx::query_as("SELECT COALESCE(MAX(display_order) + 1, 0) FROM activities")
            .fetch_one(pool)
            .await?;

    let id = sqlx::query(
        "INSERT INTO activities(name, is_active, activity_type, target_unit, display_order, created_at)
        VALUES(?, 1, ?, ?, ?, ?)",
    )
    .bind(activity.name.trim())
    .bind(activity.activity_type)
    .bind(activity.unit())
    .bind(next_order)
    .bind(Utc::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    read_activity(pool, id).await
}

/// Create an activity and, when an initial target is given, its goal for the week containing `today`.
pub async fn create_activity(
    pool: &SqlitePool,
    activity: &NewActivity,
    today: NaiveDate,
) -> Result<Activity> {
    let created = write_activity(pool, activity).await?;

    if let Some(target_value) = activity.initial_target_value() {
        upsert_goal(
            pool,
            &GoalInput {
                activity_id: created.id,
                week_start_date: week_start(today),
                target_value,
            },
        )
        .await?;
    }

    Ok(created)
}

pub async fn read_activity(pool: &SqlitePool, id: Id) -> Result<Activity> {
    sqlx::query_as::<_, Activity>("SELECT * FROM activities WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| MomentumError::not_found(format!("Activity {}", id)).into())
}

pub async fn read_active_activities(pool: &SqlitePool) -> Result<Vec<Activity>> {
    Ok(sqlx::query_as::<_, Activity>(
        "SELECT * FROM activities WHERE is_active = 1 ORDER BY display_order, id",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn update_activity(
    pool: &SqlitePool,
    id: Id,
    update: &ActivityUpdate,
) -> Result<Activity> {
    let mut activity = read_activity(pool, id).await?;

    if let Some(name) = &update.name {
        if name.trim().is_empty() {
            return Err(MomentumError::invalid("activity name cannot be empty").into());
        }
        activity.name = name.trim().to_string();
    }
    if let Some(activity_type) = update.activity_type {
        activity.activity_type = activity_type;
    }
    if let Some(unit) = &update.target_unit {
        activity.target_unit = unit.trim().to_string();
    }
    if let Some(is_active) = update.is_active {
        activity.is_active = is_active;
    }

    sqlx::query(
        "UPDATE activities SET name=?, activity_type=?, target_unit=?, is_active=?
        WHERE id=?",
    )
    .bind(&activity.name)
    .bind(activity.activity_type)
    .bind(&activity.target_unit)
    .bind(activity.is_active)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(activity)
}

/// Soft delete: the activity drops out of listings but its history stays.
pub async fn delete_activity(pool: &SqlitePool, id: Id) -> Result<()> {
    let result = sqlx::query("UPDATE activities SET is_active = 0 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(MomentumError::not_found(format!("Activity {}", id)).into());
    }
    Ok(())
}

pub async fn set_display_order(pool: &SqlitePool, id: Id, display_order: i64) -> Result<()> {
    sqlx::query("UPDATE activities SET display_order = ? WHERE id = ?")
        .bind(display_order)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

// Daily entries

pub async fn upsert_entry(pool: &SqlitePool, entry: &EntryInput) -> Result<DailyEntry> {
    entry.validate()?;
    read_activity(pool, entry.activity_id).await?;

    sqlx::query(
        "INSERT INTO daily_entries(activity_id, entry_date, value_amount, created_at)
        VALUES(?, ?, ?, ?)
        ON CONFLICT(activity_id, entry_date) DO UPDATE SET value_amount = excluded.value_amount",
    )
    .bind(entry.activity_id)
    .bind(entry.entry_date)
    .bind(entry.value_amount)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    read_entry_for(pool, entry.activity_id, entry.entry_date)
        .await?
        .context("Entry vanished after upsert")
}

pub async fn read_entry(pool: &SqlitePool, id: Id) -> Result<DailyEntry> {
    sqlx::query_as::<_, DailyEntry>("SELECT * FROM daily_entries WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| MomentumError::not_found(format!("Entry {}", id)).into())
}

pub async fn read_entry_for(
    pool: &SqlitePool,
    activity_id: Id,
    entry_date: NaiveDate,
) -> Result<Option<DailyEntry>> {
    Ok(sqlx::query_as::<_, DailyEntry>(
        "SELECT * FROM daily_entries WHERE activity_id = ? AND entry_date = ?",
    )
    .bind(activity_id)
    .bind(entry_date)
    .fetch_optional(pool)
    .await?)
}

/// Entries matching every filter that is set, newest date first.
pub async fn read_entries(pool: &SqlitePool, filter: &EntryFilter) -> Result<Vec<DailyEntry>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM daily_entries WHERE 1=1");

    if let Some(activity_id) = filter.activity_id {
        query.push(" AND activity_id = ").push_bind(activity_id);
    }
    if let Some(start) = filter.start_date {
        query.push(" AND entry_date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        query.push(" AND entry_date <= ").push_bind(end);
    }
    query.push(" ORDER BY entry_date DESC, id");

    Ok(query.build_query_as::<DailyEntry>().fetch_all(pool).await?)
}

pub async fn read_entries_between(
    pool: &SqlitePool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DailyEntry>> {
    read_entries(
        pool,
        &EntryFilter {
            activity_id: None,
            start_date: Some(start),
            end_date: Some(end),
        },
    )
    .await
}

// Weekly goals

pub async fn upsert_goal(pool: &SqlitePool, goal: &GoalInput) -> Result<WeeklyGoal> {
    goal.validate()?;
    read_activity(pool, goal.activity_id).await?;

    sqlx::query(
        "INSERT INTO weekly_goals(activity_id, week_start_date, target_value, created_at)
        VALUES(?, ?, ?, ?)
        ON CONFLICT(activity_id, week_start_date) DO UPDATE SET target_value = excluded.target_value",
    )
    .bind(goal.activity_id)
    .bind(goal.week_start_date)
    .bind(goal.target_value)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    read_goal(pool, goal.activity_id, goal.week_start_date)
        .await?
        .context("Goal vanished after upsert")
}

pub async fn read_goal(
    pool: &SqlitePool,
    activity_id: Id,
    week_start_date: NaiveDate,
) -> Result<Option<WeeklyGoal>> {
    Ok(sqlx::query_as::<_, WeeklyGoal>(
        "SELECT * FROM weekly_goals WHERE activity_id = ? AND week_start_date = ?",
    )
    .bind(activity_id)
    .bind(week_start_date)
    .fetch_optional(pool)
    .await?)
}

pub async fn read_goals(
    pool: &SqlitePool,
    week_start_date: Option<NaiveDate>,
) -> Result<Vec<WeeklyGoal>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM weekly_goals");
    if let Some(week) = week_start_date {
        query.push(" WHERE week_start_date = ").push_bind(week);
    }
    query.push(" ORDER BY created_at DESC, id DESC");

    Ok(query.build_query_as::<WeeklyGoal>().fetch_all(pool).await?)
}

/// Insert a goal unless one already exists for that week. Returns whether a row was written.
pub async fn insert_goal_if_absent(pool: &SqlitePool, goal: &GoalInput) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO weekly_goals(activity_id, week_start_date, target_value, created_at)
        VALUES(?, ?, ?, ?)",
    )
    .bind(goal.activity_id)
    .bind(goal.week_start_date)
    .bind(goal.target_value)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// Weekly reflections

pub async fn upsert_reflection(
    pool: &SqlitePool,
    reflection: &ReflectionInput,
) -> Result<WeeklyReflection> {
    read_activity(pool, reflection.activity_id).await?;

    sqlx::query(
        "INSERT INTO weekly_reflections(activity_id, week_start_date, reflection_text, created_at)
        VALUES(?, ?, ?, ?)
        ON CONFLICT(activity_id, week_start_date) DO UPDATE SET reflection_text = excluded.reflection_text",
    )
    .bind(reflection.activity_id)
    .bind(reflection.week_start_date)
    .bind(&reflection.reflection_text)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    let stored = sqlx::query_as::<_, WeeklyReflection>(
        "SELECT * FROM weekly_reflections WHERE activity_id = ? AND week_start_date = ?",
    )
    .bind(reflection.activity_id)
    .bind(reflection.week_start_date)
    .fetch_one(pool)
    .await?;

    Ok(stored)
}

pub async fn read_reflections(
    pool: &SqlitePool,
    week_start_date: Option<NaiveDate>,
) -> Result<Vec<WeeklyReflection>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM weekly_reflections");
    if let Some(week) = week_start_date {
        query.push(" WHERE week_start_date = ").push_bind(week);
    }
    query.push(" ORDER BY created_at DESC, id DESC");

    Ok(query
        .build_query_as::<WeeklyReflection>()
        .fetch_all(pool)
        .await?)
}

// Activity goals (weekly checklist)

/// Append a sub-goal at the end of the activity's list for that week.
pub async fn write_activity_goal(
    pool: &SqlitePool,
    goal: &NewActivityGoal,
) -> Result<ActivityGoal> {
    goal.validate()?;
    read_activity(pool, goal.activity_id).await?;

    let (display_order,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM activity_goals WHERE activity_id = ? AND week_start_date = ?",
    )
    .bind(goal.activity_id)
    .bind(goal.week_start_date)
    .fetch_one(pool)
    .await?;

    insert_activity_goal(
        pool,
        goal.activity_id,
        goal.week_start_date,
        goal.goal_text.trim(),
        display_order,
    )
    .await
}

pub async fn insert_activity_goal(
    pool: &SqlitePool,
    activity_id: Id,
    week_start_date: NaiveDate,
    goal_text: &str,
    display_order: i64,
) -> Result<ActivityGoal> {
    let id = sqlx::query(
        "INSERT INTO activity_goals(activity_id, week_start_date, goal_text, completed, display_order, created_at)
        VALUES(?, ?, ?, 0, ?, ?)",
    )
    .bind(activity_id)
    .bind(week_start_date)
    .bind(goal_text)
    .bind(display_order)
    .bind(Utc::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    read_activity_goal(pool, id).await
}

pub async fn read_activity_goal(pool: &SqlitePool, id: Id) -> Result<ActivityGoal> {
    sqlx::query_as::<_, ActivityGoal>("SELECT * FROM activity_goals WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| MomentumError::not_found(format!("Activity goal {}", id)).into())
}

pub async fn toggle_activity_goal(
    pool: &SqlitePool,
    id: Id,
    completed: bool,
    now: DateTime<Utc>,
) -> Result<ActivityGoal> {
    let completed_at = if completed { Some(now) } else { None };

    let result = sqlx::query("UPDATE activity_goals SET completed = ?, completed_at = ? WHERE id = ?")
        .bind(completed)
        .bind(completed_at)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(MomentumError::not_found(format!("Activity goal {}", id)).into());
    }
    read_activity_goal(pool, id).await
}

pub async fn delete_activity_goal(pool: &SqlitePool, id: Id) -> Result<()> {
    let result = sqlx::query("DELETE FROM activity_goals WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(MomentumError::not_found(format!("Activity goal {}", id)).into());
    }
    Ok(())
}

pub async fn read_activity_goals(
    pool: &SqlitePool,
    week_start_date: NaiveDate,
) -> Result<Vec<ActivityGoal>> {
    Ok(sqlx::query_as::<_, ActivityGoal>(
        "SELECT * FROM activity_goals WHERE week_start_date = ? ORDER BY display_order, id",
    )
    .bind(week_start_date)
    .fetch_all(pool)
    .await?)
}

pub async fn read_incomplete_activity_goals(
    pool: &SqlitePool,
    activity_id: Id,
    week_start_date: NaiveDate,
) -> Result<Vec<ActivityGoal>> {
    Ok(sqlx::query_as::<_, ActivityGoal>(
        "SELECT * FROM activity_goals
        WHERE activity_id = ? AND week_start_date = ? AND completed = 0
        ORDER BY display_order, id",
    )
    .bind(activity_id)
    .bind(week_start_date)
    .fetch_all(pool)
    .await?)
}

// Timer sync

pub async fn read_timer(
    pool: &SqlitePool,
    activity_id: Id,
    for_date: NaiveDate,
) -> Result<Option<TimerSync>> {
    Ok(sqlx::query_as::<_, TimerSync>(
        "SELECT * FROM timer_sync WHERE activity_id = ? AND for_date = ?",
    )
    .bind(activity_id)
    .bind(for_date)
    .fetch_optional(pool)
    .await?)
}

pub async fn upsert_timer(pool: &SqlitePool, timer: &TimerSync) -> Result<()> {
    sqlx::query(
        "INSERT INTO timer_sync(activity_id, for_date, is_active, start_time, paused_seconds, updated_at)
        VALUES(?, ?, ?, ?, ?, ?)
        ON CONFLICT(activity_id, for_date) DO UPDATE SET
            is_active = excluded.is_active,
            start_time = excluded.start_time,
            paused_seconds = excluded.paused_seconds,
            updated_at = excluded.updated_at",
    )
    .bind(timer.activity_id)
    .bind(timer.for_date)
    .bind(timer.is_active)
    .bind(timer.start_time)
    .bind(timer.paused_seconds)
    .bind(timer.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_timer(pool: &SqlitePool, activity_id: Id, for_date: NaiveDate) -> Result<()> {
    sqlx::query("DELETE FROM timer_sync WHERE activity_id = ? AND for_date = ?")
        .bind(activity_id)
        .bind(for_date)
        .execute(pool)
        .await?;

    Ok(())
}
