//! Google sign-in, the day's tasks and calendar events, proxied through the shared client.

use std::convert::Infallible;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

use super::{json_body, json_reply, message_reply, with_google};
use crate::google::auth::TokenInput;
use crate::google::calendar::{CalendarEvent, EventPatch};
use crate::google::tasks::TaskInput;
use crate::google::GoogleClient;
use crate::models::ToggleInput;
use crate::week::week_start;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TasksQuery {
    pub date: Option<NaiveDate>,
}

/// Date range for events; `to` is exclusive and defaults to a week after `from`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl EventsQuery {
    fn range(&self, today: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let from = self.from.unwrap_or_else(|| week_start(today));
        let to = self.to.unwrap_or(from + Duration::days(7));
        (midnight_utc(from), midnight_utc(to))
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

pub fn routes(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    auth_url(google.clone())
        .or(post_token(google.clone()))
        .or(sign_out(google.clone()))
        .or(auth_status(google.clone()))
        .or(list_tasks(google.clone()))
        .or(post_task(google.clone()))
        .or(update_task(google.clone()))
        .or(toggle_task(google.clone()))
        .or(delete_task(google.clone()))
        .or(list_events(google.clone()))
        .or(post_event(google.clone()))
        .or(update_event(google.clone()))
        .or(delete_event(google))
}

// Filters
pub fn auth_url(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "google" / "auth_url")
        .and(warp::get())
        .and(with_google(google))
        .and_then(auth_url_handler)
}

pub fn post_token(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "google" / "token")
        .and(warp::post())
        .and(json_body::<TokenInput>())
        .and(with_google(google))
        .and_then(token_handler)
}

pub fn sign_out(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "google" / "sign_out")
        .and(warp::post())
        .and(with_google(google))
        .and_then(sign_out_handler)
}

pub fn auth_status(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "google" / "status")
        .and(warp::get())
        .and(with_google(google))
        .and_then(status_handler)
}

pub fn list_tasks(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "google" / "tasks")
        .and(warp::get())
        .and(warp::query::<TasksQuery>())
        .and(with_google(google))
        .and_then(list_tasks_handler)
}

pub fn post_task(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "google" / "tasks")
        .and(warp::post())
        .and(json_body::<TaskInput>())
        .and(with_google(google))
        .and_then(new_task)
}

pub fn update_task(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "google" / "tasks" / String)
        .and(warp::put())
        .and(json_body::<TaskInput>())
        .and(with_google(google))
        .and_then(update_task_handler)
}

pub fn toggle_task(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "google" / "tasks" / String / "toggle")
        .and(warp::post())
        .and(json_body::<ToggleInput>())
        .and(with_google(google))
        .and_then(toggle_task_handler)
}

pub fn delete_task(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "google" / "tasks" / String)
        .and(warp::delete())
        .and(with_google(google))
        .and_then(delete_task_handler)
}

pub fn list_events(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "google" / "events")
        .and(warp::get())
        .and(warp::query::<EventsQuery>())
        .and(with_google(google))
        .and_then(list_events_handler)
}

pub fn post_event(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "google" / "events")
        .and(warp::post())
        .and(json_body::<CalendarEvent>())
        .and(with_google(google))
        .and_then(new_event)
}

pub fn update_event(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "google" / "events" / String / String)
        .and(warp::put())
        .and(json_body::<EventPatch>())
        .and(with_google(google))
        .and_then(update_event_handler)
}

pub fn delete_event(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path!("api" / "google" / "events" / String / String)
        .and(warp::delete())
        .and(with_google(google))
        .and_then(delete_event_handler)
}

// Handlers
async fn auth_url_handler(google: Arc<GoogleClient>) -> Result<Response, Infallible> {
    Ok(json_reply(
        google
            .authorize_url()
            .map(|url| serde_json::json!({ "url": url })),
    ))
}

async fn token_handler(
    input: TokenInput,
    google: Arc<GoogleClient>,
) -> Result<Response, Infallible> {
    Ok(json_reply(google.sign_in(&input.access_token, Utc::now()).await))
}

async fn sign_out_handler(google: Arc<GoogleClient>) -> Result<Response, Infallible> {
    Ok(message_reply(google.sign_out().await, "Signed out."))
}

async fn status_handler(google: Arc<GoogleClient>) -> Result<Response, Infallible> {
    let status = google.status(Utc::now()).await;
    Ok(warp::reply::json(&status).into_response())
}

async fn list_tasks_handler(
    query: TasksQuery,
    google: Arc<GoogleClient>,
) -> Result<Response, Infallible> {
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    Ok(json_reply(google.tasks_due_on(date).await))
}

async fn new_task(input: TaskInput, google: Arc<GoogleClient>) -> Result<Response, Infallible> {
    Ok(json_reply(google.create_task(&input).await))
}

async fn update_task_handler(
    task_id: String,
    input: TaskInput,
    google: Arc<GoogleClient>,
) -> Result<Response, Infallible> {
    Ok(json_reply(google.update_task(&task_id, &input).await))
}

async fn toggle_task_handler(
    task_id: String,
    input: ToggleInput,
    google: Arc<GoogleClient>,
) -> Result<Response, Infallible> {
    Ok(json_reply(
        google.set_task_completed(&task_id, input.completed).await,
    ))
}

async fn delete_task_handler(
    task_id: String,
    google: Arc<GoogleClient>,
) -> Result<Response, Infallible> {
    Ok(message_reply(google.delete_task(&task_id).await, "Task deleted."))
}

async fn list_events_handler(
    query: EventsQuery,
    google: Arc<GoogleClient>,
) -> Result<Response, Infallible> {
    let (from, to) = query.range(Local::now().date_naive());
    Ok(json_reply(google.list_all_events(from, to).await))
}

async fn new_event(
    event: CalendarEvent,
    google: Arc<GoogleClient>,
) -> Result<Response, Infallible> {
    Ok(json_reply(
        google
            .create_event(event.calendar_id.as_deref(), &event)
            .await,
    ))
}

async fn update_event_handler(
    calendar_id: String,
    event_id: String,
    patch: EventPatch,
    google: Arc<GoogleClient>,
) -> Result<Response, Infallible> {
    Ok(json_reply(
        google.update_event(&calendar_id, &event_id, &patch).await,
    ))
}

async fn delete_event_handler(
    calendar_id: String,
    event_id: String,
    google: Arc<GoogleClient>,
) -> Result<Response, Infallible> {
    Ok(message_reply(
        google.delete_event(&calendar_id, &event_id).await,
        "Event deleted.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GoogleSettings;
    use crate::google::auth::AuthStatus;
    use crate::google::tasks::TaskItem;
    use crate::google::tests::signed_in_client;
    use anyhow::Result;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_events_range_defaults_to_the_week() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        let (from, to) = EventsQuery::default().range(today);
        assert_eq!(from.to_rfc3339(), "2024-03-04T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2024-03-11T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_signed_out_status_and_unauthorized_tasks() -> Result<()> {
        let google = Arc::new(GoogleClient::new(GoogleSettings::default()));
        let filter = routes(google);

        let res = warp::test::request()
            .method("GET")
            .path("/api/google/status")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), 200);
        let status: AuthStatus = serde_json::from_slice(res.body())?;
        assert!(!status.signed_in);

        let res = warp::test::request()
            .method("GET")
            .path("/api/google/tasks?date=2024-03-06")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), 401);

        Ok(())
    }

    #[tokio::test]
    async fn test_auth_url_needs_client_id() -> Result<()> {
        let filter = auth_url(Arc::new(GoogleClient::new(GoogleSettings::default())));
        let res = warp::test::request()
            .method("GET")
            .path("/api/google/auth_url")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), 400);

        let settings = GoogleSettings {
            client_id: Some("client-123".to_string()),
            ..GoogleSettings::default()
        };
        let filter = auth_url(Arc::new(GoogleClient::new(settings)));
        let res = warp::test::request()
            .method("GET")
            .path("/api/google/auth_url")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(res.body())?;
        assert!(body["url"]
            .as_str()
            .unwrap_or_default()
            .contains("client_id=client-123"));

        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_task() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/tasks/v1/lists/@default/tasks/t1"))
            .and(body_partial_json(json!({ "status": "completed" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t1",
                "title": "Call mum",
                "status": "completed"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let google = Arc::new(signed_in_client(&server.uri()).await);
        let filter = toggle_task(google);

        let res = warp::test::request()
            .method("POST")
            .path("/api/google/tasks/t1/toggle")
            .json(&ToggleInput { completed: true })
            .reply(&filter)
            .await;

        assert_eq!(res.status(), 200);
        let task: TaskItem = serde_json::from_slice(res.body())?;
        assert!(task.completed);

        Ok(())
    }

    #[tokio::test]
    async fn test_google_failure_is_bad_gateway() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/calendars/team/events"))
            .and(query_param("singleEvents", "true"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
            .mount(&server)
            .await;

        let google = Arc::new(signed_in_client(&server.uri()).await);
        let filter = list_events(google);

        let res = warp::test::request()
            .method("GET")
            .path("/api/google/events?from=2024-03-04")
            .reply(&filter)
            .await;

        assert_eq!(res.status(), 502);

        Ok(())
    }

    #[tokio::test]
    async fn test_put_event_forwards_partial_body() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/calendar/v3/calendars/primary/events/e1"))
            .and(body_partial_json(json!({ "status": "cancelled" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "e1",
                "summary": "Dentist",
                "status": "cancelled",
                "start": { "date": "2024-03-06" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let google = Arc::new(signed_in_client(&server.uri()).await);
        let filter = update_event(google);

        let res = warp::test::request()
            .method("PUT")
            .path("/api/google/events/primary/e1")
            .json(&json!({ "status": "cancelled" }))
            .reply(&filter)
            .await;

        assert_eq!(res.status(), 200);
        let event: CalendarEvent = serde_json::from_slice(res.body())?;
        assert_eq!(event.summary, "Dentist");
        assert_eq!(event.calendar_id.as_deref(), Some("primary"));

        let requests = server.received_requests().await.unwrap_or_default();
        let sent: serde_json::Value = requests[0].body_json()?;
        assert!(sent.get("summary").is_none());
        assert!(sent.get("start").is_none());

        Ok(())
    }
}
