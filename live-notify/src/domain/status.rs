//! Stream status snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the monitored channel at one poll instant.
///
/// When `is_live` is false every live-only field is `None` (unknown, not zero).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatus {
    pub is_live: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Broadcaster display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Broadcaster login, used to build the channel URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl StreamStatus {
    /// An offline snapshot with every live-only field absent.
    pub fn offline() -> Self {
        Self::default()
    }

    /// Start building a live snapshot.
    pub fn live() -> LiveStatusBuilder {
        LiveStatusBuilder::default()
    }

    /// Strip live-only fields from an offline snapshot.
    pub fn normalized(self) -> Self {
        if self.is_live { self } else { Self::offline() }
    }

    /// Session identifier derived from the stream start time.
    pub fn session_id(&self) -> Option<SessionId> {
        if !self.is_live {
            return None;
        }
        self.started_at.map(SessionId::from_started_at)
    }

    /// Non-empty game name, if any.
    pub fn game(&self) -> Option<&str> {
        self.game_name.as_deref().filter(|g| !g.trim().is_empty())
    }

    /// Name to show for the broadcaster, falling back to `channel`.
    pub fn display_name<'a>(&'a self, channel: &'a str) -> &'a str {
        self.user_name
            .as_deref()
            .or(self.user_login.as_deref())
            .unwrap_or(channel)
    }

    /// Channel URL on Twitch.
    pub fn channel_url(&self, channel: &str) -> String {
        let login = self.user_login.as_deref().unwrap_or(channel);
        format!("https://twitch.tv/{}", login.to_lowercase())
    }

    /// Uptime formatted as `<h>h <m>m`, if the start time is known.
    pub fn uptime(&self, now: DateTime<Utc>) -> Option<String> {
        let started_at = self.started_at?;
        let secs = (now - started_at).num_seconds().max(0);
        Some(format!("{}h {}m", secs / 3600, (secs % 3600) / 60))
    }
}

/// Opaque identifier of one live session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn from_started_at(started_at: DateTime<Utc>) -> Self {
        Self(started_at.to_rfc3339())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builder for live snapshots, mostly used by status sources and tests.
#[derive(Debug, Default)]
pub struct LiveStatusBuilder {
    status: StreamStatus,
}

impl LiveStatusBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.status.title = Some(title.into());
        self
    }

    pub fn game(mut self, game: impl Into<String>) -> Self {
        self.status.game_name = Some(game.into());
        self
    }

    pub fn viewers(mut self, count: u64) -> Self {
        self.status.viewer_count = Some(count);
        self
    }

    pub fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.status.started_at = Some(started_at);
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.status.thumbnail_url = Some(url.into());
        self
    }

    pub fn user(mut self, login: impl Into<String>, name: impl Into<String>) -> Self {
        self.status.user_login = Some(login.into());
        self.status.user_name = Some(name.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.status.language = Some(language.into());
        self
    }

    pub fn build(mut self) -> StreamStatus {
        self.status.is_live = true;
        self.status
    }
}
