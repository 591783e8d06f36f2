//! Daily entries, weekly goals, reflections and per-week sub-goals.

use std::convert::Infallible;

use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::{json_body, json_reply, message_reply, with_pool};
use crate::db;
use crate::models::{
    EntryFilter, EntryInput, GoalInput, Id, NewActivityGoal, ReflectionInput, ToggleInput,
    WeekQuery,
};
use crate::week::week_start;

pub fn routes(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    list_entries(pool.clone())
        .or(post_entry(pool.clone()))
        .or(get_entry(pool.clone()))
        .or(list_goals(pool.clone()))
        .or(post_goal(pool.clone()))
        .or(list_reflections(pool.clone()))
        .or(post_reflection(pool.clone()))
        .or(list_activity_goals(pool.clone()))
        .or(post_activity_goal(pool.clone()))
        .or(toggle_activity_goal(pool.clone()))
        .or(delete_activity_goal(pool))
}

// Filters
pub fn list_entries(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "entries")
        .and(warp::get())
        .and(warp::query::<EntryFilter>())
        .and(with_pool(pool))
        .and_then(list_entries_handler)
}

pub fn post_entry(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "entries")
        .and(warp::post())
        .and(json_body::<EntryInput>())
        .and(with_pool(pool))
        .and_then(new_entry)
}

pub fn get_entry(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "entries" / Id)
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(read_entry)
}

pub fn list_goals(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "goals")
        .and(warp::get())
        .and(warp::query::<WeekQuery>())
        .and(with_pool(pool))
        .and_then(list_goals_handler)
}

pub fn post_goal(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "goals")
        .and(warp::post())
        .and(json_body::<GoalInput>())
        .and(with_pool(pool))
        .and_then(new_goal)
}

pub fn list_reflections(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "reflections")
        .and(warp::get())
        .and(warp::query::<WeekQuery>())
        .and(with_pool(pool))
        .and_then(list_reflections_handler)
}

pub fn post_reflection(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "reflections")
        .and(warp::post())
        .and(json_body::<ReflectionInput>())
        .and(with_pool(pool))
        .and_then(new_reflection)
}

pub fn list_activity_goals(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "activity_goals")
        .and(warp::get())
        .and(warp::query::<WeekQuery>())
        .and(with_pool(pool))
        .and_then(list_activity_goals_handler)
}

pub fn post_activity_goal(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "activity_goals")
        .and(warp::post())
        .and(json_body::<NewActivityGoal>())
        .and(with_pool(pool))
        .and_then(new_activity_goal)
}

pub fn toggle_activity_goal(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "activity_goals" / Id / "toggle")
        .and(warp::post())
        .and(json_body::<ToggleInput>())
        .and(with_pool(pool))
        .and_then(toggle_activity_goal_handler)
}

pub fn delete_activity_goal(
    pool: SqlitePool,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "activity_goals" / Id)
        .and(warp::delete())
        .and(with_pool(pool))
        .and_then(delete_activity_goal_handler)
}

// Handlers
async fn list_entries_handler(
    filter: EntryFilter,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    Ok(json_reply(db::read_entries(&pool, &filter).await))
}

async fn new_entry(entry: EntryInput, pool: SqlitePool) -> Result<Response, Infallible> {
    Ok(json_reply(db::upsert_entry(&pool, &entry).await))
}

async fn read_entry(id: Id, pool: SqlitePool) -> Result<Response, Infallible> {
    Ok(json_reply(db::read_entry(&pool, id).await))
}

async fn list_goals_handler(query: WeekQuery, pool: SqlitePool) -> Result<Response, Infallible> {
    Ok(json_reply(db::read_goals(&pool, query.week_start_date).await))
}

async fn new_goal(goal: GoalInput, pool: SqlitePool) -> Result<Response, Infallible> {
    Ok(json_reply(db::upsert_goal(&pool, &goal).await))
}

async fn list_reflections_handler(
    query: WeekQuery,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    Ok(json_reply(
        db::read_reflections(&pool, query.week_start_date).await,
    ))
}

async fn new_reflection(
    reflection: ReflectionInput,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    Ok(json_reply(db::upsert_reflection(&pool, &reflection).await))
}

/// Without a week, lists the current week's sub-goals.
async fn list_activity_goals_handler(
    query: WeekQuery,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    let week = query
        .week_start_date
        .unwrap_or_else(|| week_start(chrono::Local::now().date_naive()));
    Ok(json_reply(db::read_activity_goals(&pool, week).await))
}

async fn new_activity_goal(
    goal: NewActivityGoal,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    Ok(json_reply(db::write_activity_goal(&pool, &goal).await))
}

async fn toggle_activity_goal_handler(
    id: Id,
    input: ToggleInput,
    pool: SqlitePool,
) -> Result<Response, Infallible> {
    Ok(json_reply(
        db::toggle_activity_goal(&pool, id, input.completed, Utc::now()).await,
    ))
}

async fn delete_activity_goal_handler(id: Id, pool: SqlitePool) -> Result<Response, Infallible> {
    Ok(message_reply(
        db::delete_activity_goal(&pool, id).await,
        "Goal deleted.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{sample_activity, setup_test_db};
    use crate::models::{ActivityGoal, DailyEntry, WeeklyGoal};
    use anyhow::Result;
    use bytes::Bytes;
    use chrono::NaiveDate;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    #[tokio::test]
    async fn test_post_entry_upserts() -> Result<()> {
        let pool = setup_test_db().await?;
        let activity = db::write_activity(&pool, &sample_activity("Guitar")).await?;
        let filter = post_entry(pool.clone());

        for value in [30.0, 45.0] {
            let res = warp::test::request()
                .method("POST")
                .path("/api/entries")
                .json(&EntryInput {
                    activity_id: activity.id,
                    entry_date: monday(),
                    value_amount: value,
                })
                .reply(&filter)
                .await;
            assert_eq!(res.status(), 200);
        }

        let entries = db::read_entries(&pool, &EntryFilter::default()).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value_amount, 45.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_post_negative_entry_is_400() -> Result<()> {
        let pool = setup_test_db().await?;
        let activity = db::write_activity(&pool, &sample_activity("Guitar")).await?;
        let filter = post_entry(pool);

        let res = warp::test::request()
            .method("POST")
            .path("/api/entries")
            .json(&EntryInput {
                activity_id: activity.id,
                entry_date: monday(),
                value_amount: -1.0,
            })
            .reply(&filter)
            .await;

        assert_eq!(res.status(), 400);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_entries_filters_by_query() -> Result<()> {
        let pool = setup_test_db().await?;
        let guitar = db::write_activity(&pool, &sample_activity("Guitar")).await?;
        let run = db::write_activity(&pool, &sample_activity("Run")).await?;
        for (activity_id, day) in [(guitar.id, 4), (guitar.id, 5), (run.id, 5), (guitar.id, 12)] {
            db::upsert_entry(
                &pool,
                &EntryInput {
                    activity_id,
                    entry_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
                    value_amount: 10.0,
                },
            )
            .await?;
        }

        let filter = list_entries(pool);
        let res = warp::test::request()
            .method("GET")
            .path(&format!(
                "/api/entries?activity_id={}&start_date=2024-03-04&end_date=2024-03-10",
                guitar.id
            ))
            .reply(&filter)
            .await;

        assert_eq!(res.status(), 200);
        let entries: Vec<DailyEntry> = serde_json::from_slice(res.body())?;
        let days: Vec<NaiveDate> = entries.iter().map(|e| e.entry_date).collect();
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_get_entry() -> Result<()> {
        let pool = setup_test_db().await?;
        let activity = db::write_activity(&pool, &sample_activity("Guitar")).await?;
        let entry = db::upsert_entry(
            &pool,
            &EntryInput {
                activity_id: activity.id,
                entry_date: monday(),
                value_amount: 20.0,
            },
        )
        .await?;

        let filter = get_entry(pool);
        let res = warp::test::request()
            .method("GET")
            .path(&format!("/api/entries/{}", entry.id))
            .reply(&filter)
            .await;

        let exp_json = Bytes::from(serde_json::to_string(&entry)?);
        assert_eq!(res.status(), 200);
        assert_eq!(res.body(), &exp_json);

        Ok(())
    }

    #[tokio::test]
    async fn test_goals_for_a_week() -> Result<()> {
        let pool = setup_test_db().await?;
        let activity = db::write_activity(&pool, &sample_activity("Guitar")).await?;
        let filter = routes(pool.clone());

        let res = warp::test::request()
            .method("POST")
            .path("/api/goals")
            .json(&GoalInput {
                activity_id: activity.id,
                week_start_date: monday(),
                target_value: 5.0,
            })
            .reply(&filter)
            .await;
        assert_eq!(res.status(), 200);

        let res = warp::test::request()
            .method("GET")
            .path("/api/goals?week_start_date=2024-03-04")
            .reply(&filter)
            .await;
        let goals: Vec<WeeklyGoal> = serde_json::from_slice(res.body())?;
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].target_value, 5.0);

        let res = warp::test::request()
            .method("GET")
            .path("/api/goals?week_start_date=2024-03-11")
            .reply(&filter)
            .await;
        let goals: Vec<WeeklyGoal> = serde_json::from_slice(res.body())?;
        assert!(goals.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_reflection_for_unknown_activity_is_404() -> Result<()> {
        let pool = setup_test_db().await?;
        let filter = post_reflection(pool);

        let res = warp::test::request()
            .method("POST")
            .path("/api/reflections")
            .json(&ReflectionInput {
                activity_id: 9,
                week_start_date: monday(),
                reflection_text: "Good week".to_string(),
            })
            .reply(&filter)
            .await;

        assert_eq!(res.status(), 404);

        Ok(())
    }

    #[tokio::test]
    async fn test_activity_goal_lifecycle() -> Result<()> {
        let pool = setup_test_db().await?;
        let activity = db::write_activity(&pool, &sample_activity("Guitar")).await?;
        let filter = routes(pool.clone());

        let res = warp::test::request()
            .method("POST")
            .path("/api/activity_goals")
            .json(&NewActivityGoal {
                activity_id: activity.id,
                week_start_date: monday(),
                goal_text: "Learn the F chord".to_string(),
            })
            .reply(&filter)
            .await;
        assert_eq!(res.status(), 200);
        let goal: ActivityGoal = serde_json::from_slice(res.body())?;

        let res = warp::test::request()
            .method("POST")
            .path(&format!("/api/activity_goals/{}/toggle", goal.id))
            .json(&ToggleInput { completed: true })
            .reply(&filter)
            .await;
        assert_eq!(res.status(), 200);
        let toggled: ActivityGoal = serde_json::from_slice(res.body())?;
        assert!(toggled.completed);
        assert!(toggled.completed_at.is_some());

        let res = warp::test::request()
            .method("GET")
            .path("/api/activity_goals?week_start_date=2024-03-04")
            .reply(&filter)
            .await;
        let listed: Vec<ActivityGoal> = serde_json::from_slice(res.body())?;
        assert_eq!(listed, vec![toggled]);

        let res = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/activity_goals/{}", goal.id))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), 200);

        let res = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/activity_goals/{}", goal.id))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), 404);

        Ok(())
    }
}
