//! qBittorrent Web API client.
//!
//! Only the two calls the synchronizer needs: cookie login and
//! `app/setPreferences`. Many sidecar deployments bypass auth for localhost,
//! so both the no-credentials mode and a missing session cookie on a
//! successful login are tolerated.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE};
use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::sync::PortTarget;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the qBittorrent Web API.
pub struct QbitClient {
    base_url: String,
    username: String,
    password: String,
    http: reqwest::Client,
}

impl QbitClient {
    pub fn new(base_url: &str, username: &str, password: &str) -> SyncResult<Self> {
        // A fixed timeout keeps a stuck qBittorrent from holding the
        // synchronizer's lock indefinitely.
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            http,
        })
    }

    /// Log in and return the session cookie, if one was issued.
    ///
    /// With no credentials configured this is a no-op (no-auth mode). A
    /// successful response without an SID cookie is also fine: auth may be
    /// bypassed on the qBittorrent side.
    async fn authenticate(&self) -> SyncResult<Option<String>> {
        if self.username.is_empty() && self.password.is_empty() {
            return Ok(None);
        }

        let response = self
            .http
            .post(format!("{}/api/v2/auth/login", self.base_url))
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::AuthenticationFailed(
                response.status().as_u16(),
            ));
        }

        Ok(extract_sid(response.headers()))
    }

    /// Push a preferences update to qBittorrent.
    ///
    /// The Web API takes the preference object as a JSON string inside a
    /// form field named `json`.
    pub async fn set_preferences(&self, prefs: &serde_json::Value) -> SyncResult<()> {
        let sid = self.authenticate().await?;

        let mut request = self
            .http
            .post(format!("{}/api/v2/app/setPreferences", self.base_url))
            .form(&[("json", prefs.to_string())]);

        if let Some(sid) = sid {
            request = request.header(COOKIE, format!("SID={}", sid));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::RemoteUpdateFailed { status, body });
        }

        Ok(())
    }
}

#[async_trait]
impl PortTarget for QbitClient {
    async fn set_listen_port(&self, port: u16) -> SyncResult<()> {
        self.set_preferences(&serde_json::json!({ "listen_port": port }))
            .await
    }
}

/// Pull the `SID` session cookie out of the login response headers.
fn extract_sid(headers: &HeaderMap) -> Option<String> {
    headers.get_all(SET_COOKIE).iter().find_map(|value| {
        let raw = value.to_str().ok()?;
        let parsed = cookie::Cookie::parse(raw).ok()?;
        (parsed.name() == "SID").then(|| parsed.value().to_string())
    })
}
