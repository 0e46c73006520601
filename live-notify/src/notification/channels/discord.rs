//! Discord webhook notification channel.
//!
//! Rate limits are handled the way Discord recommends: no hardcoded limits,
//! 429 responses are retried after `Retry-After` (or `X-RateLimit-Reset-After`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{Notifier, StyleOptions};
use crate::domain::StreamStatus;
use crate::monitor::NotificationKind;
use crate::notification::template::{MessageTemplate, RenderContext};
use crate::scheduler::Clock;
use crate::{Error, Result};

/// Maximum number of attempts for rate-limited requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

const FOOTER_TEXT: &str = "Twitch Stream Notification";

/// Discord webhook configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Discord webhook URL.
    #[serde(default)]
    pub webhook_url: String,
    /// Optional username for the webhook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Optional avatar URL for the webhook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Posts stream notifications to a Discord webhook.
pub struct DiscordChannel {
    config: DiscordConfig,
    client: Client,
    channel: String,
    clock: Arc<dyn Clock>,
}

impl DiscordChannel {
    /// Create a channel posting about `channel` (the monitored login).
    pub fn new(
        config: DiscordConfig,
        client: Client,
        channel: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            client,
            channel: channel.into(),
            clock,
        }
    }

    fn embed_title(
        &self,
        kind: &NotificationKind,
        status: &StreamStatus,
        style: &StyleOptions,
    ) -> String {
        let streamer = status.display_name(&self.channel);
        match kind {
            NotificationKind::WentOffline(_) => format!("{} is now offline", streamer),
            _ => match status.title.as_deref().filter(|t| style.include_title && !t.is_empty()) {
                Some(title) => title.to_string(),
                None => format!("{} is live on Twitch!", streamer),
            },
        }
    }

    /// Build the webhook payload for one notification.
    fn build_payload(
        &self,
        kind: &NotificationKind,
        status: &StreamStatus,
        template: &MessageTemplate,
        style: &StyleOptions,
        now: DateTime<Utc>,
    ) -> serde_json::Value {
        let ctx = RenderContext {
            kind,
            status,
            channel: &self.channel,
            now,
        };

        let mut fields = Vec::new();
        if style.include_game
            && let Some(game) = status.game()
        {
            fields.push(json!({ "name": "Game", "value": game, "inline": true }));
        }
        if style.include_viewer_count && status.is_live {
            fields.push(json!({
                "name": "Viewers",
                "value": status.viewer_count.unwrap_or(0).to_string(),
                "inline": true
            }));
        }
        if let Some(uptime) = status.uptime(now) {
            fields.push(json!({ "name": "Uptime", "value": uptime, "inline": true }));
        }

        let mut embed = json!({
            "title": self.embed_title(kind, status, style),
            "type": "rich",
            "description": template.render(&ctx),
            "color": style.embed_color,
            "timestamp": now.to_rfc3339(),
            "footer": { "text": FOOTER_TEXT },
            "fields": fields,
        });

        if style.include_channel_link {
            embed["url"] = json!(status.channel_url(&self.channel));
        }
        if style.include_thumbnail
            && let Some(thumbnail) = status.thumbnail_url.as_deref()
        {
            let separator = if thumbnail.contains('?') { '&' } else { '?' };
            embed["image"] = json!({
                "url": format!("{}{}t={}", thumbnail, separator, now.timestamp())
            });
        }

        let mut payload = json!({
            "embeds": [embed]
        });

        if let Some(content) = style.content_text.as_ref().filter(|t| !t.is_empty()) {
            payload["content"] = json!(content.render(&ctx));
        }
        if let Some(username) = &self.config.username {
            payload["username"] = json!(username);
        }
        if let Some(avatar_url) = &self.config.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        payload
    }

    /// Send request with rate limit handling.
    async fn send_with_retry(&self, payload: &serde_json::Value) -> Result<()> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self
                .client
                .post(&self.config.webhook_url)
                .json(payload)
                .send()
                .await
                .map_err(|e| Error::notification(format!("Discord request failed: {}", e)))?;

            let status = response.status();

            if status.is_success() {
                return Ok(());
            }

            if status.as_u16() == 429 {
                let retry_after = parse_retry_after(response.headers());

                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    warn!(
                        attempts,
                        ?retry_after,
                        "Discord rate limit: max retries exceeded"
                    );
                    return Err(Error::notification(format!(
                        "Discord rate limit exceeded after {} attempts",
                        MAX_RATE_LIMIT_RETRIES
                    )));
                }

                let wait = retry_after.unwrap_or(Duration::from_secs(1));
                debug!(
                    ?wait,
                    attempt = attempts,
                    max_attempts = MAX_RATE_LIMIT_RETRIES,
                    "Discord rate limited, waiting before retry"
                );
                self.clock.sleep(wait).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            warn!(%status, %body, "Discord webhook failed");
            return Err(Error::notification(format!(
                "Discord webhook failed: {} - {}",
                status, body
            )));
        }
    }
}

/// Parse the wait time from a 429 response.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    ["Retry-After", "X-RateLimit-Reset-After"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok()?.trim().parse::<f64>().ok())
        .find(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[async_trait]
impl Notifier for DiscordChannel {
    fn channel_type(&self) -> &'static str {
        "discord"
    }

    async fn send(
        &self,
        kind: &NotificationKind,
        status: &StreamStatus,
        template: &MessageTemplate,
        style: &StyleOptions,
    ) -> Result<()> {
        if self.config.webhook_url.is_empty() {
            return Err(Error::notification("Discord webhook URL is not configured"));
        }

        let payload = self.build_payload(kind, status, template, style, self.clock.now());
        self.send_with_retry(&payload).await?;

        info!(event = kind.name(), channel = %self.channel, "Discord notification sent");
        Ok(())
    }
}
