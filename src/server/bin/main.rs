use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use momentum::api;
use momentum::config::Settings;
use momentum::db;
use momentum::google::GoogleClient;
use momentum::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env()?;

    let subscriber = get_subscriber(
        "momentum".into(),
        settings.log_filter.clone(),
        std::io::stdout,
    );
    init_subscriber(subscriber)?;

    for origin in &settings.rejected_origins {
        warn!(origin = %origin, "ignoring invalid CORS origin");
    }

    let pool = db::setup_pool(&settings.database_url).await?;
    db::setup_db(&pool).await?;

    let google = Arc::new(GoogleClient::new(settings.google.clone()));
    if let Some(token) = &settings.google.access_token {
        if let Err(e) = google.sign_in(token, Utc::now()).await {
            warn!(error = %e, "ignoring GOOGLE_ACCESS_TOKEN");
        }
    }
    if !settings.google.is_configured() {
        info!("Google integration not configured; calendar and tasks routes will return 401");
    }

    let routes = api::routes(pool, google, &settings.cors_origins);

    info!(addr = %settings.addr, "momentum server listening");
    warp::serve(routes).run(settings.addr).await;

    Ok(())
}
