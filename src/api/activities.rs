use std::convert::Infallible;

use chrono::Local;
use sqlx::sqlite::SqlitePool;
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::{json_body, json_reply, message_reply, with_pool};
use crate::db;
use crate::models::{ActivityUpdate, Id, NewActivity, ReorderInput};
use crate::reorder;

pub fn routes(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    list_activities(pool.clone())
        .or(post_activity(pool.clone()))
        .or(reorder_activities(pool.clone()))
        .or(get_activity(pool.clone()))
        .or(update_activity(pool.clone()))
        .or(delete_activity(pool.clone()))
        .or(move_to_end(pool))
}

// Filters
pub fn list_activities(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "activities")
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(list_activities_handler)
}

pub fn post_activity(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "activities")
        .and(warp::post())
        .and(json_body::<NewActivity>())
        .and(with_pool(pool))
        .and_then(new_activity)
}

pub fn get_activity(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "activities" / Id)
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(read_activity)
}

pub fn update_activity(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "activities" / Id)
        .and(warp::put())
        .and(json_body::<ActivityUpdate>())
        .and(with_pool(pool))
        .and_then(update_activity_handler)
}

pub fn delete_activity(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "activities" / Id)
        .and(warp::delete())
        .and(with_pool(pool))
        .and_then(delete_activity_handler)
}

pub fn reorder_activities(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "activities" / "reorder")
        .and(warp::post())
        .and(json_body::<ReorderInput>())
        .and(with_pool(pool))
        .and_then(reorder_handler)
}

pub fn move_to_end(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "activities" / Id / "move_to_end")
        .and(warp::post())
        .and(with_pool(pool))
        .and_then(move_to_end_handler)
}

// Handlers
async fn list_activities_handler(pool: SqlitePool) -> Result<Response, Infallible> {
    Ok(json_reply(db::read_active_activities(&pool).await))
}

async fn new_activity(activity: NewActivity, pool: SqlitePool) -> Result<Response, Infallible> {
    let today = Local::now().date_naive();
    Ok(json_reply(db::create_activity(&pool, &activity, today).await))
}

async fn read_activity(id: Id, pool: SqlitePool) -> Result<Response, Infallible> {
    Ok(json_reply(db::read_activity(&pool, id).await))
}

async fn update_activity_handler(
    id: Id,
    update: ActivityUpdate,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    Ok(json_reply(db::update_activity(&pool, id, &update).await))
}

async fn delete_activity_handler(id: Id, pool: SqlitePool) -> Result<Response, Infallible> {
    Ok(message_reply(
        db::delete_activity(&pool, id).await,
        "Activity deleted.",
    ))
}

async fn reorder_handler(input: ReorderInput, pool: SqlitePool) -> Result<Response, Infallible> {
    Ok(json_reply(
        reorder::reorder_activities(&pool, input.from, input.to).await,
    ))
}

async fn move_to_end_handler(id: Id, pool: SqlitePool) -> Result<Response, Infallible> {
    Ok(json_reply(reorder::move_activity_to_end(&pool, id).await))
}
