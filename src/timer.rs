//! Stopwatch shared between devices.
//!
//! Each (activity, date) pair has at most one running stopwatch, stored as a
//! `timer_sync` row. Clients poll the row and keep whichever copy was written
//! last. Stopping folds the elapsed time into that day's entry.

use std::cmp::Ordering;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use tracing::info;

use crate::db;
use crate::error::MomentumError;
use crate::models::{EntryInput, Id};

/// How often clients re-read the shared record.
pub const POLL_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TimerSync {
    pub activity_id: Id,
    pub for_date: NaiveDate,
    pub is_active: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub paused_seconds: i64,
    pub updated_at: DateTime<Utc>,
}

impl TimerSync {
    pub fn started(activity_id: Id, for_date: NaiveDate, now: DateTime<Utc>) -> Self {
        TimerSync {
            activity_id,
            for_date,
            is_active: true,
            start_time: Some(now),
            paused_seconds: 0,
            updated_at: now,
        }
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        let running = match (self.is_active, self.start_time) {
            (true, Some(start)) => now.signed_duration_since(start).num_seconds().max(0),
            _ => 0,
        };
        self.paused_seconds + running
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        if !self.is_active {
            return;
        }
        self.paused_seconds = self.elapsed_seconds(now);
        self.is_active = false;
        self.start_time = None;
        self.updated_at = now;
    }

    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.is_active {
            return;
        }
        self.is_active = true;
        self.start_time = Some(now);
        self.updated_at = now;
    }

    /// A record last touched on an earlier day than `now` belongs to an abandoned session.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.updated_at.date_naive() < now.date_naive()
    }
}

/// Last write wins; a missing side loses to a present one.
pub fn reconcile(local: Option<TimerSync>, remote: Option<TimerSync>) -> Option<TimerSync> {
    match (local, remote) {
        (Some(l), Some(r)) => match l.updated_at.cmp(&r.updated_at) {
            Ordering::Greater => Some(l),
            _ => Some(r),
        },
        (l, r) => l.or(r),
    }
}

pub fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub timer: Option<TimerSync>,
    pub elapsed_seconds: i64,
}

impl TimerStatus {
    pub fn at(timer: Option<TimerSync>, now: DateTime<Utc>) -> Self {
        let elapsed_seconds = timer.as_ref().map_or(0, |t| t.elapsed_seconds(now));
        TimerStatus {
            timer,
            elapsed_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopOutcome {
    pub activity_id: Id,
    pub for_date: NaiveDate,
    pub minutes_added: f64,
    pub total_minutes: f64,
}

pub async fn status(
    pool: &SqlitePool,
    activity_id: Id,
    for_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<TimerStatus> {
    let timer = db::read_timer(pool, activity_id, for_date).await?;
    Ok(TimerStatus::at(timer, now))
}

pub async fn start(
    pool: &SqlitePool,
    activity_id: Id,
    for_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<TimerSync> {
    db::read_activity(pool, activity_id).await?;

    let timer = match db::read_timer(pool, activity_id, for_date).await? {
        Some(existing) if existing.is_active && !existing.is_stale(now) => return Ok(existing),
        Some(mut existing) if !existing.is_stale(now) => {
            existing.resume(now);
            existing
        }
        _ => TimerSync::started(activity_id, for_date, now),
    };

    db::upsert_timer(pool, &timer).await?;
    info!(activity_id, %for_date, "timer started");
    Ok(timer)
}

pub async fn pause(
    pool: &SqlitePool,
    activity_id: Id,
    for_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<TimerSync> {
    let mut timer = require(pool, activity_id, for_date).await?;
    timer.pause(now);
    db::upsert_timer(pool, &timer).await?;
    Ok(timer)
}

pub async fn resume(
    pool: &SqlitePool,
    activity_id: Id,
    for_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<TimerSync> {
    let mut timer = require(pool, activity_id, for_date).await?;
    timer.resume(now);
    db::upsert_timer(pool, &timer).await?;
    Ok(timer)
}

pub async fn stop(
    pool: &SqlitePool,
    activity_id: Id,
    for_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<StopOutcome> {
    let timer = require(pool, activity_id, for_date).await?;
    let minutes_added = timer.elapsed_seconds(now) as f64 / 60.0;

    let current = db::read_entry_for(pool, activity_id, for_date)
        .await?
        .map_or(0.0, |e| e.value_amount);
    let total_minutes = current + minutes_added;

    db::upsert_entry(
        pool,
        &EntryInput {
            activity_id,
            entry_date: for_date,
            value_amount: total_minutes,
        },
    )
    .await?;
    db::delete_timer(pool, activity_id, for_date).await?;

    info!(activity_id, %for_date, minutes_added, "timer stopped");
    Ok(StopOutcome {
        activity_id,
        for_date,
        minutes_added,
        total_minutes,
    })
}

pub async fn cancel(pool: &SqlitePool, activity_id: Id, for_date: NaiveDate) -> Result<()> {
    require(pool, activity_id, for_date).await?;
    db::delete_timer(pool, activity_id, for_date).await
}

async fn require(pool: &SqlitePool, activity_id: Id, for_date: NaiveDate) -> Result<TimerSync> {
    db::read_timer(pool, activity_id, for_date)
        .await?
        .ok_or_else(|| {
            MomentumError::not_found(format!("Timer for activity {} on {}", activity_id, for_date))
                .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{sample_activity, setup_test_db};
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 6, h, m, s).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
    }

    #[test]
    fn test_elapsed_survives_pause_and_resume() {
        let mut timer = TimerSync::started(1, day(), at(9, 0, 0));
        timer.pause(at(9, 10, 0));
        assert_eq!(timer.elapsed_seconds(at(9, 30, 0)), 600);

        timer.resume(at(10, 0, 0));
        assert_eq!(timer.elapsed_seconds(at(10, 5, 30)), 930);
    }

    #[test]
    fn test_pause_twice_is_harmless() {
        let mut timer = TimerSync::started(1, day(), at(9, 0, 0));
        timer.pause(at(9, 1, 0));
        timer.pause(at(9, 5, 0));
        assert_eq!(timer.paused_seconds, 60);
    }

    #[test]
    fn test_reconcile_prefers_newest() {
        let older = TimerSync::started(1, day(), at(9, 0, 0));
        let mut newer = older.clone();
        newer.pause(at(9, 5, 0));

        assert_eq!(reconcile(Some(older.clone()), Some(newer.clone())), Some(newer.clone()));
        assert_eq!(reconcile(Some(newer.clone()), Some(older.clone())), Some(newer));
        assert_eq!(reconcile(None, Some(older.clone())), Some(older.clone()));
        assert_eq!(reconcile(Some(older.clone()), None), Some(older));
        assert_eq!(reconcile(None, None), None);
    }

    #[test]
    fn test_stale_records() {
        let timer = TimerSync::started(1, day(), at(23, 0, 0));
        assert!(!timer.is_stale(at(23, 59, 0)));
        assert!(timer.is_stale(at(23, 0, 0) + Duration::hours(2)));
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(3725), "01:02:05");
    }

    #[tokio::test]
    async fn test_stop_adds_minutes_to_entry() -> Result<()> {
        let pool = setup_test_db().await?;
        let activity = db::write_activity(&pool, &sample_activity("Guitar")).await?;

        db::upsert_entry(
            &pool,
            &EntryInput {
                activity_id: activity.id,
                entry_date: day(),
                value_amount: 30.0,
            },
        )
        .await?;

        start(&pool, activity.id, day(), at(9, 0, 0)).await?;
        pause(&pool, activity.id, day(), at(9, 20, 0)).await?;
        resume(&pool, activity.id, day(), at(10, 0, 0)).await?;
        let outcome = stop(&pool, activity.id, day(), at(10, 25, 0)).await?;

        assert_eq!(outcome.minutes_added, 45.0);
        assert_eq!(outcome.total_minutes, 75.0);

        let entry = db::read_entry_for(&pool, activity.id, day()).await?.unwrap();
        assert_eq!(entry.value_amount, 75.0);
        assert!(db::read_timer(&pool, activity.id, day()).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_start_is_idempotent_while_running() -> Result<()> {
        let pool = setup_test_db().await?;
        let activity = db::write_activity(&pool, &sample_activity("Guitar")).await?;

        let first = start(&pool, activity.id, day(), at(9, 0, 0)).await?;
        let second = start(&pool, activity.id, day(), at(9, 30, 0)).await?;
        assert_eq!(first, second);

        let state = status(&pool, activity.id, day(), at(9, 45, 0)).await?;
        assert_eq!(state.elapsed_seconds, 45 * 60);

        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_discards_time() -> Result<()> {
        let pool = setup_test_db().await?;
        let activity = db::write_activity(&pool, &sample_activity("Guitar")).await?;

        start(&pool, activity.id, day(), at(9, 0, 0)).await?;
        cancel(&pool, activity.id, day()).await?;

        assert!(db::read_timer(&pool, activity.id, day()).await?.is_none());
        assert!(db::read_entry_for(&pool, activity.id, day()).await?.is_none());
        assert!(stop(&pool, activity.id, day(), at(9, 5, 0)).await.is_err());

        Ok(())
    }
}
