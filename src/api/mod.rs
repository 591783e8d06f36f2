//! HTTP surface of the service: warp filters per resource plus shared helpers.

pub mod activities;
pub mod dashboard;
pub mod google;
pub mod timer;
pub mod tracking;

use std::convert::Infallible;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use tracing::{error, warn};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

use crate::error::MomentumError;
use crate::google::GoogleClient;

const BODY_LIMIT: u64 = 1024 * 16;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub(crate) fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(BODY_LIMIT).and(warp::body::json())
}

pub(crate) fn with_pool(
    pool: SqlitePool,
) -> impl Filter<Extract = (SqlitePool,), Error = Infallible> + Clone {
    warp::any().map(move || pool.clone())
}

pub(crate) fn with_google(
    google: Arc<GoogleClient>,
) -> impl Filter<Extract = (Arc<GoogleClient>,), Error = Infallible> + Clone {
    warp::any().map(move || google.clone())
}

pub(crate) fn json_reply<T: Serialize>(result: anyhow::Result<T>) -> Response {
    match result {
        Ok(value) => warp::reply::json(&value).into_response(),
        Err(e) => error_reply(e),
    }
}

pub(crate) fn message_reply(result: anyhow::Result<()>, message: &str) -> Response {
    match result {
        Ok(()) => warp::reply::json(&serde_json::json!({ "message": message })).into_response(),
        Err(e) => error_reply(e),
    }
}

pub(crate) fn status_for(err: &anyhow::Error) -> StatusCode {
    if let Some(e) = err.downcast_ref::<MomentumError>() {
        return match e {
            MomentumError::NotFound(_) => StatusCode::NOT_FOUND,
            MomentumError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            MomentumError::Unauthorized => StatusCode::UNAUTHORIZED,
            MomentumError::Google { .. } => StatusCode::BAD_GATEWAY,
        };
    }
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_reply(err: anyhow::Error) -> Response {
    let status = status_for(&err);
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = ?err, "request failed");
        "Internal server error".to_string()
    } else {
        warn!(error = %err, status = status.as_u16(), "request rejected");
        err.to_string()
    };

    warp::reply::with_status(warp::reply::json(&ErrorBody { error: message }), status)
        .into_response()
}

pub fn root() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end().and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "message": "Momentum Tracker API",
            "version": env!("CARGO_PKG_VERSION"),
        }))
    })
}

pub fn health() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({ "status": "healthy" })))
}

/// Every route, wrapped with request spans, CORS and JSON rejections.
pub fn routes(
    pool: SqlitePool,
    google: Arc<GoogleClient>,
    cors_origins: &[String],
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_origins(cors_origins.iter().map(String::as_str))
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_headers(vec!["content-type", "authorization"])
        .allow_credentials(true);

    root()
        .or(health())
        .or(dashboard::routes(pool.clone()))
        .or(activities::routes(pool.clone()))
        .or(tracking::routes(pool.clone()))
        .or(timer::routes(pool))
        .or(google::routes(google))
        .recover(handle_rejection)
        .with(cors)
        .with(warp::trace(|info| {
            tracing::info_span!(
                "request",
                method = %info.method(),
                path = %info.path(),
                request_id = %Uuid::new_v4(),
            )
        }))
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        warn!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(warp::reply::with_status(warp::reply::json(&ErrorBody { error: message }), status)
        .into_response())
}
