//! Google Calendar and Google Tasks over their REST APIs.
//!
//! One `GoogleClient` is shared by the whole server. It holds the OAuth access
//! token the user handed over (implicit flow, so no refresh token) and signs
//! every request with it.

pub mod auth;
pub mod calendar;
pub mod tasks;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::config::GoogleSettings;
use crate::error::MomentumError;

pub use auth::{AuthStatus, StoredToken};
pub use calendar::{CalendarEvent, EventPatch, EventTime};
pub use tasks::{GoogleTask, TaskItem, TaskStatus};

pub const API_BASE: &str = "https://www.googleapis.com";
pub const REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
pub const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

pub struct GoogleClient {
    http: Client,
    api_base: String,
    revoke_url: String,
    settings: GoogleSettings,
    token: RwLock<Option<StoredToken>>,
}

impl GoogleClient {
    pub fn new(settings: GoogleSettings) -> Self {
        Self::with_endpoints(settings, API_BASE, REVOKE_URL)
    }

    pub fn with_endpoints(settings: GoogleSettings, api_base: &str, revoke_url: &str) -> Self {
        GoogleClient {
            http: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            revoke_url: revoke_url.to_string(),
            settings,
            token: RwLock::new(None),
        }
    }

    /// Calendars shown on the dashboard; falls back to the user's primary calendar.
    pub fn calendar_ids(&self) -> Vec<String> {
        if self.settings.calendar_ids.is_empty() {
            vec!["primary".to_string()]
        } else {
            self.settings.calendar_ids.clone()
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .with_context(|| format!("Invalid Google API base: {}", self.api_base))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Google API base cannot take a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn access_token(&self) -> Result<String> {
        let token = self.token.read().await;
        match token.as_ref() {
            Some(t) if t.is_valid(chrono::Utc::now()) => Ok(t.access_token.clone()),
            _ => Err(MomentumError::Unauthorized.into()),
        }
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(request.bearer_auth(self.access_token().await?))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = check(request.send().await.context("Google API request failed")?).await?;
        Ok(response
            .json::<T>()
            .await
            .context("Failed to parse Google response")?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<()> {
        check(request.send().await.context("Google API request failed")?).await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(MomentumError::Google {
        status: status.as_u16(),
        body,
    }
    .into())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) async fn signed_in_client(api_base: &str) -> GoogleClient {
        let settings = GoogleSettings {
            client_id: Some("client-123".to_string()),
            calendar_ids: vec!["primary".to_string(), "team".to_string()],
            ..GoogleSettings::default()
        };
        let client = GoogleClient::with_endpoints(settings, api_base, &format!("{}/revoke", api_base));
        client
            .store_token(StoredToken::issued("token-abc", None, Utc::now()))
            .await;
        client
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = GoogleClient::with_endpoints(
            GoogleSettings::default(),
            "https://example.test/",
            REVOKE_URL,
        );
        let url = client
            .endpoint(&["calendar", "v3", "calendars", "a b#c", "events"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.test/calendar/v3/calendars/a%20b%23c/events"
        );
    }

    #[test]
    fn test_calendar_ids_default_to_primary() {
        let client = GoogleClient::new(GoogleSettings::default());
        assert_eq!(client.calendar_ids(), vec!["primary"]);
    }

    #[tokio::test]
    async fn test_requests_without_token_are_unauthorized() {
        let client = GoogleClient::new(GoogleSettings::default());
        let err = client.access_token().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MomentumError>(),
            Some(MomentumError::Unauthorized)
        ));
    }
}
