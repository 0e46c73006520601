//! End-to-end tests for the poll scheduler.
//!
//! These drive a full scheduler (fetcher, tracker, gate, store, notifier)
//! against scripted upstream responses and a manual clock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use live_notify::credentials::{AuthError, AuthProvider, Credential, CredentialSource};
use live_notify::domain::{RetryPolicy, StreamStatus};
use live_notify::monitor::{
    EngineState, JsonFileStateStore, MemoryStateStore, NotificationKind, RetryingFetcher,
    SourceError, StateStore, StatusSource,
};
use live_notify::notification::{MessageTemplate, Notifier, StyleOptions};
use live_notify::scheduler::{Clock, EngineConfig, ManualClock, PollMode, PollScheduler};
use live_notify::{Error, Result};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
}

fn live(viewers: u64, game: &str, started: DateTime<Utc>) -> StreamStatus {
    StreamStatus::live()
        .title("Speedrun practice")
        .game(game)
        .viewers(viewers)
        .started_at(started)
        .user("somechannel", "SomeChannel")
        .build()
}

struct StaticCredentials;

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn refresh(
        &self,
        _client_id: &str,
        _client_secret: &str,
    ) -> std::result::Result<Credential, AuthError> {
        Ok(Credential::new("token", at(23, 0) + chrono::Duration::days(30)))
    }
}

/// Hands out queued responses; offline once the queue is empty.
#[derive(Default)]
struct QueuedSource {
    responses: Mutex<VecDeque<std::result::Result<StreamStatus, SourceError>>>,
}

impl QueuedSource {
    fn push(&self, response: std::result::Result<StreamStatus, SourceError>) {
        self.responses.lock().push_back(response);
    }
}

#[async_trait]
impl StatusSource for QueuedSource {
    async fn fetch_status(
        &self,
        _channel: &str,
        _credential: &Credential,
    ) -> std::result::Result<StreamStatus, SourceError> {
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(StreamStatus::offline()))
    }
}

#[derive(Default)]
struct CollectingNotifier {
    sent: Mutex<Vec<NotificationKind>>,
}

impl CollectingNotifier {
    fn take(&self) -> Vec<NotificationKind> {
        std::mem::take(&mut *self.sent.lock())
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    fn channel_type(&self) -> &'static str {
        "collecting"
    }

    async fn send(
        &self,
        kind: &NotificationKind,
        _status: &StreamStatus,
        _template: &MessageTemplate,
        _style: &StyleOptions,
    ) -> Result<()> {
        self.sent.lock().push(kind.clone());
        Ok(())
    }
}

struct Engine {
    clock: Arc<ManualClock>,
    source: Arc<QueuedSource>,
    notifier: Arc<CollectingNotifier>,
    scheduler: PollScheduler,
}

fn config() -> EngineConfig {
    EngineConfig {
        channel: "somechannel".to_string(),
        viewer_milestone_thresholds: vec![50, 100],
        notify_on_game_change: true,
        ..EngineConfig::default()
    }
}

fn start_engine(
    start: DateTime<Utc>,
    policy: RetryPolicy,
    store: Arc<dyn StateStore>,
    state: EngineState,
) -> Engine {
    let clock = Arc::new(ManualClock::new(start));
    let source = Arc::new(QueuedSource::default());
    let notifier = Arc::new(CollectingNotifier::default());
    let auth = Arc::new(AuthProvider::new(
        "client",
        "secret",
        Arc::new(StaticCredentials),
        clock.clone(),
    ));
    let fetcher = RetryingFetcher::new(source.clone(), auth, clock.clone(), policy);
    let scheduler = PollScheduler::new(
        config(),
        fetcher,
        store,
        notifier.clone(),
        clock.clone(),
        state,
    );

    Engine {
        clock,
        source,
        notifier,
        scheduler,
    }
}

impl Engine {
    /// Queue one response, jump the clock to `now` and run a cycle.
    async fn poll_at(
        &mut self,
        now: DateTime<Utc>,
        response: std::result::Result<StreamStatus, SourceError>,
    ) -> Vec<NotificationKind> {
        self.clock.advance(now - self.clock.now());
        self.source.push(response);
        let report = self.scheduler.tick().await;
        assert!(report.error.is_none(), "unexpected error: {:?}", report.error);
        self.notifier.take()
    }
}

mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_session_lifecycle() {
        let store = Arc::new(MemoryStateStore::new());
        let mut engine = start_engine(
            at(17, 0),
            RetryPolicy::no_retry(),
            store.clone(),
            EngineState::new(),
        );
        let started = at(18, 0);

        assert!(engine.poll_at(at(17, 0), Ok(StreamStatus::offline())).await.is_empty());
        assert_eq!(engine.scheduler.mode(), PollMode::Idle);
        assert_eq!(engine.scheduler.time_until_next_poll(), Duration::from_secs(180));

        let sent = engine.poll_at(at(18, 1), Ok(live(30, "Chess", started))).await;
        assert_eq!(sent, vec![NotificationKind::WentLive]);
        assert_eq!(engine.scheduler.mode(), PollMode::Active);
        assert_eq!(engine.scheduler.time_until_next_poll(), Duration::from_secs(60));

        let sent = engine.poll_at(at(18, 2), Ok(live(120, "Chess", started))).await;
        assert_eq!(
            sent,
            vec![
                NotificationKind::ViewerMilestone(50),
                NotificationKind::ViewerMilestone(100),
            ]
        );

        // Dipping below a threshold and coming back does not repeat it.
        assert!(engine.poll_at(at(18, 3), Ok(live(40, "Chess", started))).await.is_empty());
        assert!(engine.poll_at(at(18, 4), Ok(live(110, "Chess", started))).await.is_empty());

        let sent = engine.poll_at(at(18, 5), Ok(live(110, "Art", started))).await;
        assert_eq!(
            sent,
            vec![NotificationKind::GameChanged {
                from: "Chess".to_string(),
                to: "Art".to_string(),
            }]
        );

        let sent = engine.poll_at(at(19, 0), Ok(StreamStatus::offline())).await;
        assert_eq!(sent, vec![NotificationKind::WentOffline(Some(started))]);
        assert_eq!(engine.scheduler.mode(), PollMode::Idle);

        let persisted = store.snapshot().unwrap();
        assert!(!persisted.last_status.is_live);
        assert_eq!(persisted, *engine.scheduler.state());
    }

    #[tokio::test]
    async fn test_flapping_stream_is_rate_limited() {
        let store = Arc::new(MemoryStateStore::new());
        let mut engine =
            start_engine(at(18, 0), RetryPolicy::no_retry(), store, EngineState::new());

        let sent = engine.poll_at(at(18, 0), Ok(live(5, "Chess", at(18, 0)))).await;
        assert_eq!(sent, vec![NotificationKind::WentLive]);

        let sent = engine.poll_at(at(18, 5), Ok(StreamStatus::offline())).await;
        assert_eq!(sent, vec![NotificationKind::WentOffline(Some(at(18, 0)))]);

        // Reconnect inside the cooldown window.
        assert!(engine.poll_at(at(18, 10), Ok(live(5, "Chess", at(18, 9)))).await.is_empty());
        assert!(engine.poll_at(at(18, 12), Ok(StreamStatus::offline())).await.is_empty());

        // Suppressed sends did not restart the window.
        let sent = engine.poll_at(at(18, 16), Ok(live(5, "Chess", at(18, 15)))).await;
        assert_eq!(sent, vec![NotificationKind::WentLive]);
    }

    #[tokio::test]
    async fn test_same_session_reconnect_keeps_milestones() {
        let store = Arc::new(MemoryStateStore::new());
        let mut engine =
            start_engine(at(18, 0), RetryPolicy::no_retry(), store, EngineState::new());
        let started = at(18, 0);

        let sent = engine.poll_at(at(18, 0), Ok(live(120, "Chess", started))).await;
        assert_eq!(
            sent,
            vec![
                NotificationKind::WentLive,
                NotificationKind::ViewerMilestone(50),
                NotificationKind::ViewerMilestone(100),
            ]
        );

        let sent = engine.poll_at(at(18, 1), Ok(StreamStatus::offline())).await;
        assert_eq!(sent, vec![NotificationKind::WentOffline(Some(started))]);

        // Upstream blip: the same stream is back one poll later.
        assert!(engine.poll_at(at(18, 2), Ok(live(120, "Chess", started))).await.is_empty());
        assert_eq!(engine.scheduler.state().last_notified_milestone, Some(100));
        assert!(engine.poll_at(at(18, 3), Ok(live(130, "Chess", started))).await.is_empty());
    }

    #[tokio::test]
    async fn test_new_session_without_offline_observation() {
        let store = Arc::new(MemoryStateStore::new());
        let mut engine =
            start_engine(at(18, 0), RetryPolicy::no_retry(), store, EngineState::new());

        let sent = engine.poll_at(at(18, 0), Ok(live(60, "Chess", at(18, 0)))).await;
        assert_eq!(
            sent,
            vec![NotificationKind::WentLive, NotificationKind::ViewerMilestone(50)]
        );

        // Stream restarted between polls; milestones start over.
        let sent = engine.poll_at(at(18, 30), Ok(live(60, "Chess", at(18, 25)))).await;
        assert_eq!(
            sent,
            vec![NotificationKind::WentLive, NotificationKind::ViewerMilestone(50)]
        );
    }
}

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_outage_keeps_mode_and_state() {
        let store = Arc::new(MemoryStateStore::new());
        let mut state = EngineState::new();
        state.last_status = live(70, "Chess", at(18, 0));
        state.current_session_id = state.last_status.session_id();
        state.last_notified_milestone = Some(50);
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            use_jitter: false,
        };
        let mut engine = start_engine(at(18, 30), policy, store.clone(), state.clone());

        engine.source.push(Err(SourceError::Status {
            code: 503,
            body: "unavailable".to_string(),
        }));
        engine.source.push(Err(SourceError::Network("connection reset".to_string())));

        let report = engine.scheduler.tick().await;
        assert!(matches!(
            report.error,
            Some(Error::FetchUnavailable { attempts: 2, .. })
        ));
        assert_eq!(report.mode, PollMode::Active);
        assert_eq!(engine.clock.sleeps(), vec![Duration::from_secs(1)]);
        assert!(engine.notifier.take().is_empty());
        assert_eq!(*engine.scheduler.state(), state);
        assert_eq!(store.save_count(), 0);

        // Recovery with the stream still live is not a new session.
        let sent = engine
            .poll_at(at(18, 32), Ok(live(70, "Chess", at(18, 0))))
            .await;
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_payload_is_not_retried() {
        let store = Arc::new(MemoryStateStore::new());
        let mut engine = start_engine(at(18, 0), RetryPolicy::default(), store, EngineState::new());
        engine.source.push(Err(SourceError::Decode("missing data".to_string())));

        let report = engine.scheduler.tick().await;
        assert!(matches!(report.error, Some(Error::FetchInvalidResponse(_))));
        assert!(engine.clock.sleeps().is_empty());
        assert_eq!(report.mode, PollMode::Idle);
    }
}

mod restart_tests {
    use super::*;

    #[tokio::test]
    async fn test_restart_does_not_repeat_notifications() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("stream_state.json");
        let started = at(18, 0);

        {
            let store = Arc::new(JsonFileStateStore::new(&path));
            let state = store.load().await.unwrap().unwrap_or_default();
            let mut engine = start_engine(at(18, 1), RetryPolicy::no_retry(), store, state);
            let sent = engine.poll_at(at(18, 1), Ok(live(60, "Chess", started))).await;
            assert_eq!(
                sent,
                vec![NotificationKind::WentLive, NotificationKind::ViewerMilestone(50)]
            );
        }

        let store = Arc::new(JsonFileStateStore::new(&path));
        let state = store.load().await.unwrap().expect("state was persisted");
        assert!(state.is_live());
        assert_eq!(state.last_notified_milestone, Some(50));

        let mut engine = start_engine(at(18, 20), RetryPolicy::no_retry(), store, state);
        assert_eq!(engine.scheduler.mode(), PollMode::Active);

        let sent = engine.poll_at(at(18, 20), Ok(live(65, "Chess", started))).await;
        assert!(sent.is_empty());

        let sent = engine.poll_at(at(18, 21), Ok(live(101, "Chess", started))).await;
        assert_eq!(sent, vec![NotificationKind::ViewerMilestone(100)]);
    }
}
