use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use dotenv::dotenv;

const DEFAULT_ADDR: &str = "0.0.0.0:3333";
const DEFAULT_LOG: &str = "info";
const DEFAULT_CORS_ORIGINS: [&str; 3] = [
    "http://localhost:8080",
    "http://localhost:5173",
    "http://localhost:3000",
];

/// Everything the server reads from its environment (and `.env`, when present).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub addr: SocketAddr,
    pub log_filter: String,
    pub cors_origins: Vec<String>,
    /// Entries of `MOMENTUM_CORS_ORIGINS` that are not origins; logged once tracing is up.
    pub rejected_origins: Vec<String>,
    pub google: GoogleSettings,
}

#[derive(Debug, Clone, Default)]
pub struct GoogleSettings {
    pub api_key: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub calendar_ids: Vec<String>,
    pub access_token: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL env var must be set!")?;
        let addr = optional("MOMENTUM_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("MOMENTUM_ADDR must be a socket address, e.g. 0.0.0.0:3333")?;
        let log_filter = optional("MOMENTUM_LOG").unwrap_or_else(|| DEFAULT_LOG.to_string());
        let (cors_origins, rejected_origins) = match optional("MOMENTUM_CORS_ORIGINS") {
            Some(list) => partition_origins(&list),
            None => (
                DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
                Vec::new(),
            ),
        };

        Ok(Settings {
            database_url,
            addr,
            log_filter,
            cors_origins,
            rejected_origins,
            google: GoogleSettings::from_env(),
        })
    }
}

impl GoogleSettings {
    pub fn from_env() -> Self {
        let calendar_ids = ["GOOGLE_CALENDAR_PRIMARY", "GOOGLE_CALENDAR_SECONDARY"]
            .iter()
            .filter_map(|key| optional(key))
            .collect();

        GoogleSettings {
            api_key: optional("GOOGLE_CALENDAR_API_KEY"),
            client_id: optional("GOOGLE_OAUTH_CLIENT_ID"),
            redirect_uri: optional("GOOGLE_OAUTH_REDIRECT_URI"),
            calendar_ids,
            access_token: optional("GOOGLE_ACCESS_TOKEN"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() || self.access_token.is_some()
    }
}

// Unset and blank variables are both treated as missing.
fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a comma list into valid origins and everything else.
fn partition_origins(raw: &str) -> (Vec<String>, Vec<String>) {
    split_list(raw).into_iter().partition(|origin| is_origin(origin))
}

/// `scheme://host[:port]` with nothing after it.
fn is_origin(raw: &str) -> bool {
    match reqwest::Url::parse(raw) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some()
                && url.path() == "/"
                && url.query().is_none()
                && !raw.ends_with('/')
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_drops_blanks() {
        let origins = split_list("http://a.test, ,http://b.test,");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_is_origin() {
        assert!(is_origin("http://localhost:8080"));
        assert!(is_origin("https://momentum.example.com"));
        assert!(!is_origin("localhost:8080"));
        assert!(!is_origin("http://localhost:8080/app"));
        assert!(!is_origin("ftp://files.example.com"));
    }

    #[test]
    fn test_partition_origins_keeps_rejects() {
        let (valid, rejected) =
            partition_origins("http://localhost:8080, localhost:3000, https://a.test/app");
        assert_eq!(valid, vec!["http://localhost:8080"]);
        assert_eq!(rejected, vec!["localhost:3000", "https://a.test/app"]);
    }

    #[test]
    fn test_google_settings_unconfigured_by_default() {
        let settings = GoogleSettings::default();
        assert!(!settings.is_configured());
        assert!(settings.calendar_ids.is_empty());
    }
}
