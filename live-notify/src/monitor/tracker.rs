//! Live/offline transition detection and milestone tracking.

use tracing::{debug, warn};

use super::events::NotificationKind;
use super::state_store::EngineState;
use crate::domain::{SessionId, StreamStatus};

/// Outcome of comparing a new snapshot against the engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    pub previous: StreamStatus,
    pub current: StreamStatus,
    /// Candidate events, in dispatch order.
    pub events: Vec<NotificationKind>,
    pub session_id: Option<SessionId>,
    pub last_notified_milestone: Option<u64>,
    /// A new live session started in this cycle.
    pub new_session: bool,
}

impl DiffResult {
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Write the tracked fields into `state`.
    pub fn apply_to(&self, state: &mut EngineState) {
        state.last_status = self.current.clone();
        state.current_session_id = self.session_id.clone();
        state.last_notified_milestone = self.last_notified_milestone;
    }

    /// Snapshot describing the session an event belongs to.
    ///
    /// `WentOffline` refers to the session that just ended, so it gets the
    /// previous (live) snapshot.
    pub fn status_for(&self, kind: &NotificationKind) -> &StreamStatus {
        match kind {
            NotificationKind::WentOffline(_) => &self.previous,
            _ => &self.current,
        }
    }
}

/// Computes the semantic diff between two snapshots.
#[derive(Debug, Clone, Default)]
pub struct StreamStateTracker {
    thresholds: Vec<u64>,
}

impl StreamStateTracker {
    pub fn new(mut thresholds: Vec<u64>) -> Self {
        thresholds.sort_unstable();
        thresholds.dedup();
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &[u64] {
        &self.thresholds
    }

    /// Compare `new_status` with `state`. Does not mutate anything.
    pub fn update(&self, state: &EngineState, new_status: StreamStatus) -> DiffResult {
        let previous = state.last_status.clone();
        let current = new_status.normalized();

        let mut events = Vec::new();
        let mut session_id = state.current_session_id.clone();
        let mut milestone = state.last_notified_milestone;
        let mut new_session = false;

        match (previous.is_live, current.is_live) {
            (false, true) => {
                events.push(NotificationKind::WentLive);
                let incoming = current.session_id();
                let resumed = matches!(
                    (&session_id, &incoming),
                    (Some(known), Some(seen)) if known == seen
                );
                if resumed {
                    debug!(session = ?incoming, "Same session back online, keeping milestones");
                } else {
                    session_id = incoming;
                    milestone = None;
                    new_session = true;
                }
            }
            (true, true) => {
                let incoming = current.session_id();
                let restarted = match (&session_id, &incoming) {
                    (Some(known), Some(seen)) => known != seen,
                    _ => false,
                };

                if restarted {
                    warn!(
                        previous_session = ?session_id,
                        new_session = ?incoming,
                        "Session changed without an offline observation, treating as a new session"
                    );
                    events.push(NotificationKind::WentLive);
                    session_id = incoming;
                    milestone = None;
                    new_session = true;
                } else {
                    if session_id.is_none() {
                        session_id = incoming;
                    }
                    if let (Some(from), Some(to)) = (previous.game(), current.game())
                        && from != to
                    {
                        events.push(NotificationKind::GameChanged {
                            from: from.to_string(),
                            to: to.to_string(),
                        });
                    }
                }
            }
            (true, false) => {
                events.push(NotificationKind::WentOffline(previous.started_at));
            }
            (false, false) => {}
        }

        if current.is_live {
            let viewers = current.viewer_count.unwrap_or(0);
            for &threshold in &self.thresholds {
                if threshold > viewers {
                    break;
                }
                if milestone.is_none_or(|m| threshold > m) {
                    events.push(NotificationKind::ViewerMilestone(threshold));
                    milestone = Some(threshold);
                }
            }
        }

        DiffResult {
            previous,
            current,
            events,
            session_id,
            last_notified_milestone: milestone,
            new_session,
        }
    }
}
