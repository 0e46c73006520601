//! Notification events derived from status changes.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A change worth telling people about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Channel went live (or a new session started).
    WentLive,
    /// Game changed within one live session.
    GameChanged { from: String, to: String },
    /// Viewer count reached a configured threshold.
    ViewerMilestone(u64),
    /// Channel went offline. Carries the start time of the ended session.
    WentOffline(Option<DateTime<Utc>>),
}

impl NotificationKind {
    /// Stable key used for cooldown bookkeeping.
    pub fn cooldown_key(&self) -> String {
        match self {
            Self::WentLive => "went_live".to_string(),
            Self::GameChanged { .. } => "game_changed".to_string(),
            Self::ViewerMilestone(threshold) => format!("viewer_milestone:{}", threshold),
            Self::WentOffline(_) => "went_offline".to_string(),
        }
    }

    /// Short label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::WentLive => "went_live",
            Self::GameChanged { .. } => "game_changed",
            Self::ViewerMilestone(_) => "viewer_milestone",
            Self::WentOffline(_) => "went_offline",
        }
    }

    /// Whether repeated events of this kind are rate-limited by the cooldown.
    ///
    /// Live/offline transitions flap when the upstream is noisy; game changes and
    /// milestones are already deduplicated by the tracker.
    pub fn is_cooldown_guarded(&self) -> bool {
        matches!(self, Self::WentLive | Self::WentOffline(_))
    }

    fn rank(&self) -> u8 {
        match self {
            Self::WentLive => 0,
            Self::GameChanged { .. } => 1,
            Self::ViewerMilestone(_) => 2,
            Self::WentOffline(_) => 3,
        }
    }

    /// Dispatch order: live, game change, milestones ascending, offline.
    pub fn dispatch_order(a: &Self, b: &Self) -> Ordering {
        match (a, b) {
            (Self::ViewerMilestone(x), Self::ViewerMilestone(y)) => x.cmp(y),
            _ => a.rank().cmp(&b.rank()),
        }
    }

    /// Get a human-readable description of the event.
    pub fn description(&self) -> String {
        match self {
            Self::WentLive => "stream went live".to_string(),
            Self::GameChanged { from, to } => format!("game changed from {} to {}", from, to),
            Self::ViewerMilestone(threshold) => format!("reached {} viewers", threshold),
            Self::WentOffline(Some(started_at)) => {
                format!("stream went offline (session started {})", started_at)
            }
            Self::WentOffline(None) => "stream went offline".to_string(),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}
