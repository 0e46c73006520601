//! Twitch Helix status source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::fetcher::{SourceError, StatusSource};
use crate::credentials::Credential;
use crate::domain::StreamStatus;

const HELIX_BASE_URL: &str = "https://api.twitch.tv/helix";

/// Error bodies are truncated to this many characters.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    data: Vec<HelixStream>,
}

#[derive(Debug, Deserialize)]
struct HelixStream {
    #[serde(default)]
    user_login: Option<String>,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    game_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    viewer_count: Option<u64>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
}

impl HelixStream {
    fn into_status(self) -> StreamStatus {
        StreamStatus {
            is_live: true,
            title: self.title,
            game_name: self.game_name.filter(|g| !g.is_empty()),
            viewer_count: self.viewer_count,
            started_at: self.started_at,
            thumbnail_url: self.thumbnail_url.filter(|u| !u.is_empty()).map(|url| {
                url.replace("{width}", "1280").replace("{height}", "720")
            }),
            user_name: self.user_name,
            user_login: self.user_login,
            language: self.language,
        }
    }
}

/// Parse a `GET /streams` body. An empty `data` array means offline.
fn parse_streams(body: &str) -> Result<StreamStatus, SourceError> {
    let response: StreamsResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;
    Ok(response
        .data
        .into_iter()
        .next()
        .map(HelixStream::into_status)
        .unwrap_or_else(StreamStatus::offline))
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

/// Reads stream status from the Helix `streams` endpoint.
pub struct HelixStatusSource {
    client: Client,
    client_id: String,
    base_url: String,
    debug_api: bool,
}

impl HelixStatusSource {
    pub fn new(client: Client, client_id: impl Into<String>) -> Self {
        Self {
            client,
            client_id: client_id.into(),
            base_url: HELIX_BASE_URL.to_string(),
            debug_api: false,
        }
    }

    /// Log every request and response body at debug level.
    pub fn with_debug_api(mut self, enabled: bool) -> Self {
        self.debug_api = enabled;
        self
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl StatusSource for HelixStatusSource {
    async fn fetch_status(
        &self,
        channel: &str,
        credential: &Credential,
    ) -> Result<StreamStatus, SourceError> {
        let url = format!("{}/streams", self.base_url);
        if self.debug_api {
            debug!(%url, user_login = channel, client_id = %self.client_id, "Stream info request");
        }

        let response = self
            .client
            .get(&url)
            .query(&[("user_login", channel)])
            .header("Client-ID", &self.client_id)
            .bearer_auth(&credential.access_token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if self.debug_api {
            debug!(status = status.as_u16(), %body, "Stream info response");
        }

        if !status.is_success() {
            return Err(SourceError::Status {
                code: status.as_u16(),
                body: truncate(&body),
            });
        }

        parse_streams(&body)
    }

    async fn probe(&self) -> Result<(), SourceError> {
        self.client.head(&self.base_url).send().await?;
        Ok(())
    }
}
