use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{GoogleClient, AUTHORIZE_URL};
use crate::error::MomentumError;

pub const SCOPES: &str =
    "https://www.googleapis.com/auth/calendar.events https://www.googleapis.com/auth/tasks";

/// Implicit-flow tokens are good for an hour and cannot be refreshed.
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn issued(access_token: &str, email: Option<String>, now: DateTime<Utc>) -> Self {
        StoredToken {
            access_token: access_token.to_string(),
            email,
            expires_at: now + Duration::seconds(TOKEN_LIFETIME_SECS),
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub signed_in: bool,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenInput {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

/// The consent URL the browser opens; Google redirects back with `#access_token=...`.
pub fn authorize_url(client_id: Option<&str>, redirect_uri: Option<&str>) -> Result<String> {
    let client_id =
        client_id.ok_or_else(|| MomentumError::invalid("GOOGLE_OAUTH_CLIENT_ID is not configured"))?;

    let mut url = Url::parse(AUTHORIZE_URL)?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", client_id)
            .append_pair("response_type", "token")
            .append_pair("scope", SCOPES)
            .append_pair("include_granted_scopes", "true");
        if let Some(redirect) = redirect_uri {
            query.append_pair("redirect_uri", redirect);
        }
    }
    Ok(url.to_string())
}

impl GoogleClient {
    pub fn authorize_url(&self) -> Result<String> {
        authorize_url(
            self.settings.client_id.as_deref(),
            self.settings.redirect_uri.as_deref(),
        )
    }

    pub(crate) async fn store_token(&self, token: StoredToken) {
        *self.token.write().await = Some(token);
    }

    /// Keep a freshly granted token and look up whose it is.
    pub async fn sign_in(&self, access_token: &str, now: DateTime<Utc>) -> Result<AuthStatus> {
        if access_token.trim().is_empty() {
            return Err(MomentumError::invalid("access_token cannot be empty").into());
        }
        self.store_token(StoredToken::issued(access_token, None, now))
            .await;

        // The email is cosmetic; a failed lookup still leaves the user signed in.
        match self.fetch_email().await {
            Ok(email) => {
                if let Some(token) = self.token.write().await.as_mut() {
                    token.email = email;
                }
            }
            Err(e) => warn!(error = %e, "could not fetch Google user info"),
        }

        let status = self.status(now).await;
        info!(email = ?status.email, "signed in to Google");
        Ok(status)
    }

    pub async fn sign_out(&self) -> Result<()> {
        let token = self.token.write().await.take();
        if let Some(token) = token {
            let request = self
                .http
                .post(&self.revoke_url)
                .form(&[("token", token.access_token.as_str())]);
            if let Err(e) = self.send_empty(request).await {
                warn!(error = %e, "token revocation failed");
            }
        }
        Ok(())
    }

    /// Expired tokens read as signed out and are dropped.
    pub async fn status(&self, now: DateTime<Utc>) -> AuthStatus {
        let mut token = self.token.write().await;
        if matches!(token.as_ref(), Some(t) if !t.is_valid(now)) {
            *token = None;
        }
        match token.as_ref() {
            Some(t) => AuthStatus {
                signed_in: true,
                email: t.email.clone(),
                expires_at: Some(t.expires_at),
            },
            None => AuthStatus {
                signed_in: false,
                email: None,
                expires_at: None,
            },
        }
    }

    async fn fetch_email(&self) -> Result<Option<String>> {
        let url = self.endpoint(&["oauth2", "v2", "userinfo"])?;
        let request = self.authorized(self.http.get(url)).await?;
        let info: UserInfo = self.send_json(request).await?;
        Ok(info.email)
    }
}
