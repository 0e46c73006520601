//! Notification channels.
//!
//! Only Discord webhooks are implemented; the engine talks to channels through
//! the [`Notifier`] trait.

mod discord;

pub use discord::{DiscordChannel, DiscordConfig};

use async_trait::async_trait;

use super::template::MessageTemplate;
use crate::Result;
use crate::domain::StreamStatus;
use crate::monitor::NotificationKind;

/// Presentation switches shared by every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOptions {
    pub include_title: bool,
    pub include_game: bool,
    pub include_viewer_count: bool,
    pub include_thumbnail: bool,
    pub include_channel_link: bool,
    /// Embed colour as `0xRRGGBB`.
    pub embed_color: u32,
    /// Plain text shown above the embed.
    pub content_text: Option<MessageTemplate>,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            include_title: true,
            include_game: true,
            include_viewer_count: true,
            include_thumbnail: true,
            include_channel_link: true,
            embed_color: 0xFF0000,
            content_text: None,
        }
    }
}

/// Delivers one decided notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Send one notification. `status` is the snapshot the event refers to.
    async fn send(
        &self,
        kind: &NotificationKind,
        status: &StreamStatus,
        template: &MessageTemplate,
        style: &StyleOptions,
    ) -> Result<()>;
}
