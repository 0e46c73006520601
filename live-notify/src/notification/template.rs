//! Message templates with `{placeholder}` substitution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::StreamStatus;
use crate::monitor::NotificationKind;

pub const DEFAULT_LIVE_TEMPLATE: &str = "🔴 **LIVE NOW!** {streamer} is streaming {game}";
pub const DEFAULT_GAME_CHANGE_TEMPLATE: &str = "🎮 {streamer} switched to {game}";
pub const DEFAULT_MILESTONE_TEMPLATE: &str =
    "🎉 **Milestone reached!** {viewers} viewers watching {streamer}";
pub const DEFAULT_OFFLINE_TEMPLATE: &str = "⚫ {streamer} is now offline after {uptime}";

/// Values available to a template.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub kind: &'a NotificationKind,
    pub status: &'a StreamStatus,
    /// Configured channel name, used when the snapshot has no broadcaster name.
    pub channel: &'a str,
    pub now: DateTime<Utc>,
}

impl RenderContext<'_> {
    fn value(&self, placeholder: &str) -> Option<String> {
        let status = self.status;
        let value = match placeholder {
            "streamer" => status.display_name(self.channel).to_string(),
            "title" => status.title.clone().unwrap_or_default(),
            "game" => status.game_name.clone().unwrap_or_default(),
            "viewers" => status.viewer_count.unwrap_or(0).to_string(),
            "url" => status.channel_url(self.channel),
            "uptime" => status.uptime(self.now).unwrap_or_default(),
            "milestone" => match self.kind {
                NotificationKind::ViewerMilestone(threshold) => threshold.to_string(),
                _ => String::new(),
            },
            _ => return None,
        };
        Some(value)
    }
}

/// A message with `{streamer}`, `{title}`, `{game}`, `{viewers}`, `{url}`,
/// `{milestone}` and `{uptime}` placeholders. Unknown placeholders are kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageTemplate(String);

impl MessageTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn render(&self, ctx: &RenderContext<'_>) -> String {
        let mut out = String::with_capacity(self.0.len());
        let mut rest = self.0.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };
            let name = &after[..close];
            match ctx.value(name) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[close + 1..];
        }

        out.push_str(rest);
        out
    }
}

impl From<&str> for MessageTemplate {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One template per notification kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTemplates {
    pub went_live: MessageTemplate,
    pub game_changed: MessageTemplate,
    pub milestone: MessageTemplate,
    pub went_offline: MessageTemplate,
}

impl NotificationTemplates {
    pub fn for_kind(&self, kind: &NotificationKind) -> &MessageTemplate {
        match kind {
            NotificationKind::WentLive => &self.went_live,
            NotificationKind::GameChanged { .. } => &self.game_changed,
            NotificationKind::ViewerMilestone(_) => &self.milestone,
            NotificationKind::WentOffline(_) => &self.went_offline,
        }
    }
}

impl Default for NotificationTemplates {
    fn default() -> Self {
        Self {
            went_live: DEFAULT_LIVE_TEMPLATE.into(),
            game_changed: DEFAULT_GAME_CHANGE_TEMPLATE.into(),
            milestone: DEFAULT_MILESTONE_TEMPLATE.into(),
            went_offline: DEFAULT_OFFLINE_TEMPLATE.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn status() -> StreamStatus {
        StreamStatus::live()
            .title("Any% attempts")
            .game("Celeste")
            .viewers(123)
            .user("speedy", "Speedy")
            .started_at(Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap())
            .build()
    }

    fn render(template: &str, kind: &NotificationKind, status: &StreamStatus) -> String {
        let ctx = RenderContext {
            kind,
            status,
            channel: "speedy",
            now: Utc.with_ymd_and_hms(2024, 5, 1, 19, 30, 0).unwrap(),
        };
        MessageTemplate::new(template).render(&ctx)
    }

    #[test]
    fn test_default_live_template() {
        let text = render(DEFAULT_LIVE_TEMPLATE, &NotificationKind::WentLive, &status());
        assert_eq!(text, "🔴 **LIVE NOW!** Speedy is streaming Celeste");
    }

    #[test]
    fn test_all_placeholders() {
        let text = render(
            "{streamer}|{title}|{game}|{viewers}|{url}|{milestone}|{uptime}",
            &NotificationKind::ViewerMilestone(100),
            &status(),
        );
        assert_eq!(
            text,
            "Speedy|Any% attempts|Celeste|123|https://twitch.tv/speedy|100|1h 30m"
        );
    }

    #[test]
    fn test_unknown_and_unclosed_placeholders_kept() {
        let text = render("{nope} {streamer} {", &NotificationKind::WentLive, &status());
        assert_eq!(text, "{nope} Speedy {");
    }

    #[test]
    fn test_missing_values_render_empty() {
        let bare = StreamStatus::live().build();
        let text = render("[{game}] {viewers}", &NotificationKind::WentLive, &bare);
        assert_eq!(text, "[] 0");
    }

    #[test]
    fn test_template_per_kind() {
        let templates = NotificationTemplates::default();
        assert_eq!(
            templates.for_kind(&NotificationKind::ViewerMilestone(50)).as_str(),
            DEFAULT_MILESTONE_TEMPLATE
        );
        assert_eq!(
            templates.for_kind(&NotificationKind::WentOffline(None)).as_str(),
            DEFAULT_OFFLINE_TEMPLATE
        );
    }
}
