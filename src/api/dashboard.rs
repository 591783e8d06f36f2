use std::convert::Infallible;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::{error_reply, json_reply, with_pool};
use crate::dashboard;
use crate::models::Id;
use crate::week::{parse_week_start, week_start};

/// `?today=` lets a client pin "today" instead of using the server's local date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodayQuery {
    pub today: Option<NaiveDate>,
}

impl TodayQuery {
    fn resolve(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

pub fn routes(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    get_dashboard(pool.clone()).or(get_daily_goal(pool))
}

pub fn get_dashboard(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "dashboard" / String)
        .and(warp::get())
        .and(warp::query::<TodayQuery>())
        .and(with_pool(pool))
        .and_then(dashboard_handler)
}

pub fn get_daily_goal(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "daily_goal" / Id)
        .and(warp::get())
        .and(warp::query::<TodayQuery>())
        .and(with_pool(pool))
        .and_then(daily_goal_handler)
}

async fn dashboard_handler(
    week: String,
    query: TodayQuery,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    let week_start_date = match parse_week_start(&week) {
        Ok(date) => date,
        Err(e) => return Ok(error_reply(e.into())),
    };
    Ok(json_reply(
        dashboard::load_week(&pool, week_start_date, query.resolve()).await,
    ))
}

async fn daily_goal_handler(
    activity_id: Id,
    query: TodayQuery,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    let today = query.resolve();
    let daily_goal = dashboard::daily_goal_for(&pool, activity_id, week_start(today), today).await;
    Ok(json_reply(daily_goal.map(|minutes| {
        serde_json::json!({ "activity_id": activity_id, "daily_goal_minutes": minutes })
    })))
}
