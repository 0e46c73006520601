//! Application configuration.
//!
//! Values are resolved in three layers: built-in defaults, an optional JSON
//! file, then environment variables (which win). A `.env` file is loaded into
//! the environment by `main` before this module reads it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::domain::RetryPolicy;
use crate::notification::template::{
    DEFAULT_GAME_CHANGE_TEMPLATE, DEFAULT_LIVE_TEMPLATE, DEFAULT_MILESTONE_TEMPLATE,
    DEFAULT_OFFLINE_TEMPLATE,
};
use crate::notification::{DiscordConfig, MessageTemplate, NotificationTemplates, StyleOptions};
use crate::scheduler::{EngineConfig, MAX_COOLDOWN_MINUTES, MAX_POLL_INTERVAL};
use crate::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Twitch application credentials and the monitored channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitchConfig {
    pub client_id: String,
    pub client_secret: String,
    pub channel_name: String,
}

/// Message content and embed styling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub message_template: String,
    pub content_text: String,
    pub game_change_template: String,
    pub milestone_template: String,
    pub offline_template: String,
    pub include_title: bool,
    pub include_game: bool,
    pub include_viewer_count: bool,
    pub include_thumbnail: bool,
    pub include_channel_link: bool,
    /// Hex colour, `RRGGBB`.
    pub embed_color: String,
    pub notify_on_game_change: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            message_template: DEFAULT_LIVE_TEMPLATE.to_string(),
            content_text: String::new(),
            game_change_template: DEFAULT_GAME_CHANGE_TEMPLATE.to_string(),
            milestone_template: DEFAULT_MILESTONE_TEMPLATE.to_string(),
            offline_template: DEFAULT_OFFLINE_TEMPLATE.to_string(),
            include_title: true,
            include_game: true,
            include_viewer_count: true,
            include_thumbnail: true,
            include_channel_link: true,
            embed_color: "FF0000".to_string(),
            notify_on_game_change: false,
        }
    }
}

/// Poll cadence and cooldown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
    pub offline_check_multiplier: u32,
    pub notification_cooldown_minutes: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            offline_check_multiplier: 3,
            notification_cooldown_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedConfig {
    pub viewer_milestone_notifications: Vec<u64>,
    pub silent_mode: bool,
    pub state_file: PathBuf,
    pub request_timeout_secs: u64,
    pub reachability_probe: bool,
    pub retry: RetryPolicy,
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            viewer_milestone_notifications: vec![50, 100, 500, 1000],
            silent_mode: false,
            state_file: PathBuf::from("stream_state.json"),
            request_timeout_secs: 10,
            reachability_probe: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub twitch: TwitchConfig,
    pub discord: DiscordConfig,
    pub notification: NotificationConfig,
    pub polling: PollingConfig,
    pub advanced: AdvancedConfig,
}

impl AppConfig {
    /// Load defaults, then `path` if it exists, then the process environment.
    ///
    /// A JSON file that cannot be read or parsed is logged and ignored.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path).unwrap_or_default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.normalize();
        Ok(config)
    }

    fn from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No config file, using environment variables only");
            return None;
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|json| Self::from_json(&json));
        match parsed {
            Ok(config) => {
                info!(path = %path.display(), "Configuration loaded from file");
                Some(config)
            }
            Err(e) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load config file, ignoring it"
                );
                None
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Override fields from environment variables. Unset or empty variables are
    /// skipped.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        env.string("TWITCH_CLIENT_ID", &mut self.twitch.client_id);
        env.string("TWITCH_CLIENT_SECRET", &mut self.twitch.client_secret);
        env.string("TWITCH_CHANNEL_NAME", &mut self.twitch.channel_name);
        env.string("DISCORD_WEBHOOK_URL", &mut self.discord.webhook_url);

        let n = &mut self.notification;
        env.string("NOTIFICATION_MESSAGE_TEMPLATE", &mut n.message_template);
        env.string("NOTIFICATION_CONTENT_TEXT", &mut n.content_text);
        env.string("NOTIFICATION_GAME_CHANGE_TEMPLATE", &mut n.game_change_template);
        env.string("NOTIFICATION_MILESTONE_TEMPLATE", &mut n.milestone_template);
        env.string("NOTIFICATION_OFFLINE_TEMPLATE", &mut n.offline_template);
        env.flag("NOTIFICATION_INCLUDE_TITLE", &mut n.include_title);
        env.flag("NOTIFICATION_INCLUDE_GAME", &mut n.include_game);
        env.flag("NOTIFICATION_INCLUDE_VIEWER_COUNT", &mut n.include_viewer_count);
        env.flag("NOTIFICATION_INCLUDE_THUMBNAIL", &mut n.include_thumbnail);
        env.flag("NOTIFICATION_INCLUDE_CHANNEL_LINK", &mut n.include_channel_link);
        env.string("NOTIFICATION_EMBED_COLOR", &mut n.embed_color);
        env.flag("NOTIFICATION_NOTIFY_ON_GAME_CHANGE", &mut n.notify_on_game_change);

        let p = &mut self.polling;
        env.number("POLLING_INTERVAL_SECONDS", &mut p.interval_seconds)?;
        env.number("POLLING_OFFLINE_CHECK_MULTIPLIER", &mut p.offline_check_multiplier)?;
        env.number(
            "POLLING_NOTIFICATION_COOLDOWN_MINUTES",
            &mut p.notification_cooldown_minutes,
        )?;

        let a = &mut self.advanced;
        if let Some(list) = env.get("ADVANCED_VIEWER_MILESTONE_NOTIFICATIONS") {
            a.viewer_milestone_notifications = parse_milestones(&list)?;
        }
        env.flag("ADVANCED_SILENT_MODE", &mut a.silent_mode);
        if let Some(path) = env.get("ADVANCED_STATE_FILE") {
            a.state_file = PathBuf::from(path);
        }

        Ok(())
    }

    /// Sort and deduplicate milestone thresholds.
    pub fn normalize(&mut self) {
        let milestones = &mut self.advanced.viewer_milestone_notifications;
        milestones.sort_unstable();
        milestones.dedup();
    }

    /// Check that the configuration can drive the engine.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        let required = [
            ("twitch.client_id", &self.twitch.client_id),
            ("twitch.client_secret", &self.twitch.client_secret),
            ("twitch.channel_name", &self.twitch.channel_name),
            ("discord.webhook_url", &self.discord.webhook_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                problems.push(format!("{} is required", name));
            }
        }

        if !self.discord.webhook_url.trim().is_empty() {
            match url::Url::parse(&self.discord.webhook_url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => problems.push(format!(
                    "discord.webhook_url has unsupported scheme '{}'",
                    url.scheme()
                )),
                Err(e) => problems.push(format!("discord.webhook_url is not a valid URL: {}", e)),
            }
        }

        if let Err(e) = parse_embed_color(&self.notification.embed_color) {
            problems.push(e.to_string());
        }
        if self.polling.interval_seconds == 0 {
            problems.push("polling.interval_seconds must be greater than zero".to_string());
        }
        if self.polling.offline_check_multiplier == 0 {
            problems.push("polling.offline_check_multiplier must be greater than zero".to_string());
        }
        let max_secs = MAX_POLL_INTERVAL.as_secs();
        let idle_secs = self
            .polling
            .interval_seconds
            .checked_mul(u64::from(self.polling.offline_check_multiplier));
        if idle_secs.is_none_or(|secs| secs > max_secs) {
            problems.push(format!(
                "polling.interval_seconds * offline_check_multiplier must not exceed {}s",
                max_secs
            ));
        }
        if self.polling.notification_cooldown_minutes > MAX_COOLDOWN_MINUTES {
            problems.push(format!(
                "polling.notification_cooldown_minutes must not exceed {}",
                MAX_COOLDOWN_MINUTES
            ));
        }
        if self.advanced.retry.max_attempts == 0 {
            problems.push("advanced.retry.max_attempts must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::config(problems.join("; ")))
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            channel: self.twitch.channel_name.trim().to_string(),
            base_interval_seconds: self.polling.interval_seconds,
            offline_check_multiplier: self.polling.offline_check_multiplier,
            notification_cooldown_minutes: self.polling.notification_cooldown_minutes,
            viewer_milestone_thresholds: self.advanced.viewer_milestone_notifications.clone(),
            notify_on_game_change: self.notification.notify_on_game_change,
            silent_mode: self.advanced.silent_mode,
        }
    }

    pub fn style_options(&self) -> Result<StyleOptions> {
        let n = &self.notification;
        Ok(StyleOptions {
            include_title: n.include_title,
            include_game: n.include_game,
            include_viewer_count: n.include_viewer_count,
            include_thumbnail: n.include_thumbnail,
            include_channel_link: n.include_channel_link,
            embed_color: parse_embed_color(&n.embed_color)?,
            content_text: Some(MessageTemplate::new(n.content_text.as_str()))
                .filter(|t| !t.is_empty()),
        })
    }

    pub fn templates(&self) -> NotificationTemplates {
        let n = &self.notification;
        let pick = |value: &str, fallback: &str| {
            if value.trim().is_empty() {
                MessageTemplate::new(fallback)
            } else {
                MessageTemplate::new(value)
            }
        };
        NotificationTemplates {
            went_live: pick(&n.message_template, DEFAULT_LIVE_TEMPLATE),
            game_changed: pick(&n.game_change_template, DEFAULT_GAME_CHANGE_TEMPLATE),
            milestone: pick(&n.milestone_template, DEFAULT_MILESTONE_TEMPLATE),
            went_offline: pick(&n.offline_template, DEFAULT_OFFLINE_TEMPLATE),
        }
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, key: &str, target: &mut String) {
        if let Some(value) = self.get(key) {
            *target = value;
        }
    }

    fn flag(&self, key: &str, target: &mut bool) {
        if let Some(value) = self.get(key) {
            *target = value.trim().eq_ignore_ascii_case("true");
        }
    }

    fn number<T: FromStr>(&self, key: &str, target: &mut T) -> Result<()> {
        if let Some(value) = self.get(key) {
            *target = value
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("{} must be a number, got '{}'", key, value)))?;
        }
        Ok(())
    }
}

/// Parse a comma separated list of viewer thresholds.
pub fn parse_milestones(list: &str) -> Result<Vec<u64>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| Error::config(format!("invalid viewer milestone '{}'", s)))
        })
        .collect()
}

/// Parse `RRGGBB` (optionally prefixed with `#` or `0x`) into `0xRRGGBB`.
pub fn parse_embed_color(value: &str) -> Result<u32> {
    let trimmed = value.trim();
    let hex = trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix("0x"))
        .unwrap_or(trimmed);
    match u32::from_str_radix(hex, 16) {
        Ok(color) if !hex.is_empty() && color <= 0xFF_FF_FF => Ok(color),
        _ => Err(Error::config(format!(
            "notification.embed_color '{}' is not a hex colour",
            value
        ))),
    }
}

/// Environment lookup backed by a map, for tests and embedding.
pub fn map_lookup(vars: &HashMap<String, String>) -> impl Fn(&str) -> Option<String> + '_ {
    move |key| vars.get(key).cloned()
}
