//! Notification delivery.
//!
//! Templates turn a decided event into text; channels deliver it.

pub mod channels;
pub mod template;

pub use channels::{DiscordChannel, DiscordConfig, Notifier, StyleOptions};
pub use template::{MessageTemplate, NotificationTemplates, RenderContext};
