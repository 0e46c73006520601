//! Cooldown and policy filtering of candidate events.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::events::NotificationKind;
use super::state_store::EngineState;
use super::tracker::DiffResult;

/// Decides which candidate events are actually dispatched.
#[derive(Debug, Clone)]
pub struct NotificationGate {
    cooldown: Duration,
    notify_on_game_change: bool,
}

impl NotificationGate {
    pub fn new(cooldown: Duration, notify_on_game_change: bool) -> Self {
        Self {
            cooldown,
            notify_on_game_change,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Filter `diff.events` and record the send time of every passing event.
    ///
    /// Suppressed events leave their timestamp untouched.
    pub fn decide(
        &self,
        diff: &DiffResult,
        state: &mut EngineState,
        now: DateTime<Utc>,
    ) -> Vec<NotificationKind> {
        let mut decided = Vec::with_capacity(diff.events.len());

        for event in &diff.events {
            if matches!(event, NotificationKind::GameChanged { .. }) && !self.notify_on_game_change
            {
                debug!(event = %event, "Game change notifications disabled");
                continue;
            }

            let key = event.cooldown_key();
            if event.is_cooldown_guarded()
                && let Some(last) = state.last_sent(&key)
            {
                let elapsed = now - last;
                if elapsed < self.cooldown {
                    info!(
                        event = event.name(),
                        elapsed_secs = elapsed.num_seconds(),
                        cooldown_secs = self.cooldown.num_seconds(),
                        "Notification suppressed by cooldown"
                    );
                    continue;
                }
            }

            state.record_sent(key, now);
            decided.push(event.clone());
        }

        decided.sort_by(NotificationKind::dispatch_order);
        decided
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StreamStatus;
    use crate::monitor::tracker::StreamStateTracker;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
    }

    fn live(game: &str, started: DateTime<Utc>) -> StreamStatus {
        StreamStatus::live()
            .game(game)
            .viewers(10)
            .started_at(started)
            .build()
    }

    fn cycle(
        tracker: &StreamStateTracker,
        gate: &NotificationGate,
        state: &mut EngineState,
        status: StreamStatus,
        now: DateTime<Utc>,
    ) -> Vec<NotificationKind> {
        let diff = tracker.update(state, status);
        diff.apply_to(state);
        gate.decide(&diff, state, now)
    }

    #[test]
    fn test_went_live_cooldown() {
        let tracker = StreamStateTracker::new(vec![]);
        let gate = NotificationGate::new(Duration::minutes(15), false);
        let mut state = EngineState::new();

        let sent = cycle(&tracker, &gate, &mut state, live("A", t0()), t0());
        assert_eq!(sent, vec![NotificationKind::WentLive]);

        let offline_at = t0() + Duration::minutes(2);
        let sent = cycle(&tracker, &gate, &mut state, StreamStatus::offline(), offline_at);
        assert_eq!(sent, vec![NotificationKind::WentOffline(Some(t0()))]);

        let relive = t0() + Duration::minutes(5);
        let sent = cycle(&tracker, &gate, &mut state, live("A", relive), relive);
        assert!(sent.is_empty());
        assert_eq!(state.last_sent("went_live"), Some(t0()));

        cycle(
            &tracker,
            &gate,
            &mut state,
            StreamStatus::offline(),
            t0() + Duration::minutes(10),
        );

        let third = t0() + Duration::minutes(20);
        let sent = cycle(&tracker, &gate, &mut state, live("A", third), third);
        assert_eq!(sent, vec![NotificationKind::WentLive]);
        assert_eq!(state.last_sent("went_live"), Some(third));
    }

    #[test]
    fn test_game_change_respects_flag() {
        let tracker = StreamStateTracker::new(vec![]);
        let mut state = EngineState::new();
        let quiet = NotificationGate::new(Duration::minutes(15), false);
        cycle(&tracker, &quiet, &mut state, live("A", t0()), t0());

        let sent = cycle(&tracker, &quiet, &mut state, live("B", t0()), t0());
        assert!(sent.is_empty());

        let loud = NotificationGate::new(Duration::minutes(15), true);
        let sent = cycle(&tracker, &loud, &mut state, live("C", t0()), t0());
        assert_eq!(
            sent,
            vec![NotificationKind::GameChanged {
                from: "B".into(),
                to: "C".into()
            }]
        );
        assert_eq!(state.last_sent("game_changed"), Some(t0()));
    }

    #[test]
    fn test_game_change_not_cooldown_suppressed() {
        let tracker = StreamStateTracker::new(vec![]);
        let gate = NotificationGate::new(Duration::minutes(15), true);
        let mut state = EngineState::new();
        cycle(&tracker, &gate, &mut state, live("A", t0()), t0());

        let now = t0() + Duration::minutes(1);
        assert_eq!(cycle(&tracker, &gate, &mut state, live("B", t0()), now).len(), 1);
        let now = t0() + Duration::minutes(2);
        assert_eq!(cycle(&tracker, &gate, &mut state, live("C", t0()), now).len(), 1);
    }

    #[test]
    fn test_milestones_pass_through_in_order() {
        let tracker = StreamStateTracker::new(vec![100, 50]);
        let gate = NotificationGate::new(Duration::minutes(15), true);
        let mut state = EngineState::new();

        let status = StreamStatus::live()
            .game("A")
            .viewers(150)
            .started_at(t0())
            .build();
        let sent = cycle(&tracker, &gate, &mut state, status, t0());
        assert_eq!(
            sent,
            vec![
                NotificationKind::WentLive,
                NotificationKind::ViewerMilestone(50),
                NotificationKind::ViewerMilestone(100),
            ]
        );
        assert_eq!(state.last_sent("viewer_milestone:100"), Some(t0()));
    }
}
