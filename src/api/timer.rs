use std::convert::Infallible;

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqlitePool;
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::{json_reply, message_reply, with_pool};
use crate::models::Id;
use crate::timer;

pub fn routes(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    get_timer(pool.clone())
        .or(start_timer(pool.clone()))
        .or(pause_timer(pool.clone()))
        .or(resume_timer(pool.clone()))
        .or(stop_timer(pool.clone()))
        .or(cancel_timer(pool))
}

pub fn get_timer(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "timer" / Id / NaiveDate)
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(status_handler)
}

pub fn start_timer(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "timer" / Id / NaiveDate / "start")
        .and(warp::post())
        .and(with_pool(pool))
        .and_then(start_handler)
}

pub fn pause_timer(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "timer" / Id / NaiveDate / "pause")
        .and(warp::post())
        .and(with_pool(pool))
        .and_then(pause_handler)
}

pub fn resume_timer(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "timer" / Id / NaiveDate / "resume")
        .and(warp::post())
        .and(with_pool(pool))
        .and_then(resume_handler)
}

pub fn stop_timer(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "timer" / Id / NaiveDate / "stop")
        .and(warp::post())
        .and(with_pool(pool))
        .and_then(stop_handler)
}

pub fn cancel_timer(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "timer" / Id / NaiveDate / "cancel")
        .and(warp::post())
        .and(with_pool(pool))
        .and_then(cancel_handler)
}

async fn status_handler(
    activity_id: Id,
    for_date: NaiveDate,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    Ok(json_reply(
        timer::status(&pool, activity_id, for_date, Utc::now()).await,
    ))
}

async fn start_handler(
    activity_id: Id,
    for_date: NaiveDate,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    Ok(json_reply(
        timer::start(&pool, activity_id, for_date, Utc::now()).await,
    ))
}

async fn pause_handler(
    activity_id: Id,
    for_date: NaiveDate,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    Ok(json_reply(
        timer::pause(&pool, activity_id, for_date, Utc::now()).await,
    ))
}

async fn resume_handler(
    activity_id: Id,
    for_date: NaiveDate,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    Ok(json_reply(
        timer::resume(&pool, activity_id, for_date, Utc::now()).await,
    ))
}

async fn stop_handler(
    activity_id: Id,
    for_date: NaiveDate,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    Ok(json_reply(
        timer::stop(&pool, activity_id, for_date, Utc::now()).await,
    ))
}

async fn cancel_handler(
    activity_id: Id,
    for_date: NaiveDate,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    Ok(message_reply(
        timer::cancel(&pool, activity_id, for_date).await,
        "Timer cancelled.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::tests::{sample_activity, setup_test_db};
    use crate::timer::{StopOutcome, TimerStatus, TimerSync};
    use anyhow::Result;

    #[tokio::test]
    async fn test_timer_round_trip_over_http() -> Result<()> {
        let pool = setup_test_db().await?;
        let activity = db::write_activity(&pool, &sample_activity("Guitar")).await?;
        let filter = routes(pool.clone());
        let base = format!("/api/timer/{}/2024-03-06", activity.id);

        let res = warp::test::request()
            .method("GET")
            .path(&base)
            .reply(&filter)
            .await;
        assert_eq!(res.status(), 200);
        let status: TimerStatus = serde_json::from_slice(res.body())?;
        assert!(status.timer.is_none());
        assert_eq!(status.elapsed_seconds, 0);

        let res = warp::test::request()
            .method("POST")
            .path(&format!("{}/start", base))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), 200);
        let started: TimerSync = serde_json::from_slice(res.body())?;
        assert!(started.is_active);

        let res = warp::test::request()
            .method("POST")
            .path(&format!("{}/pause", base))
            .reply(&filter)
            .await;
        let paused: TimerSync = serde_json::from_slice(res.body())?;
        assert!(!paused.is_active);

        let res = warp::test::request()
            .method("POST")
            .path(&format!("{}/stop", base))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), 200);
        let outcome: StopOutcome = serde_json::from_slice(res.body())?;
        assert_eq!(outcome.activity_id, activity.id);

        let date = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        assert!(db::read_timer(&pool, activity.id, date).await?.is_none());
        assert!(db::read_entry_for(&pool, activity.id, date).await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_stop_without_timer_is_404() -> Result<()> {
        let pool = setup_test_db().await?;
        let activity = db::write_activity(&pool, &sample_activity("Guitar")).await?;
        let filter = stop_timer(pool);

        let res = warp::test::request()
            .method("POST")
            .path(&format!("/api/timer/{}/2024-03-06/stop", activity.id))
            .reply(&filter)
            .await;

        assert_eq!(res.status(), 404);

        Ok(())
    }

    #[tokio::test]
    async fn test_start_for_unknown_activity_is_404() -> Result<()> {
        let pool = setup_test_db().await?;
        let filter = start_timer(pool);

        let res = warp::test::request()
            .method("POST")
            .path("/api/timer/99/2024-03-06/start")
            .reply(&filter)
            .await;

        assert_eq!(res.status(), 404);

        Ok(())
    }
}
