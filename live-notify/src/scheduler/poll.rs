//! Adaptive poll loop.
//!
//! The scheduler owns the [`EngineState`] and runs one cycle at a time:
//! token, fetch, diff, gate, persist, dispatch. It polls every
//! `base_interval_seconds` while the channel is believed live and
//! `base_interval_seconds * offline_check_multiplier` while it is believed
//! offline.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::Clock;
use crate::monitor::{
    DiffResult, EngineState, NotificationGate, NotificationKind, RetryingFetcher, StateStore,
    StreamStateTracker,
};
use crate::notification::{NotificationTemplates, Notifier, StyleOptions};
use crate::{Error, Result};

/// Polling cadence, derived from the last known live status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Believed live.
    Active,
    /// Believed offline.
    Idle,
}

impl PollMode {
    pub fn from_live(is_live: bool) -> Self {
        if is_live { Self::Active } else { Self::Idle }
    }
}

impl fmt::Display for PollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Idle => write!(f, "idle"),
        }
    }
}

/// Longest wait between two polls, whatever the configuration says.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Longest accepted notification cooldown, in minutes.
pub const MAX_COOLDOWN_MINUTES: u64 = 7 * 24 * 60;

/// Engine settings, resolved from the application config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Channel login to monitor.
    pub channel: String,
    pub base_interval_seconds: u64,
    pub offline_check_multiplier: u32,
    pub notification_cooldown_minutes: u64,
    pub viewer_milestone_thresholds: Vec<u64>,
    pub notify_on_game_change: bool,
    /// Record decisions without dispatching them.
    pub silent_mode: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel: String::new(),
            base_interval_seconds: 60,
            offline_check_multiplier: 3,
            notification_cooldown_minutes: 15,
            viewer_milestone_thresholds: vec![50, 100, 500, 1000],
            notify_on_game_change: false,
            silent_mode: false,
        }
    }
}

impl EngineConfig {
    /// Sleep between two polls in `mode`.
    ///
    /// Saturates at [`MAX_POLL_INTERVAL`].
    pub fn interval_for(&self, mode: PollMode) -> Duration {
        let base = Duration::from_secs(self.base_interval_seconds);
        let interval = match mode {
            PollMode::Active => Some(base),
            PollMode::Idle => base.checked_mul(self.offline_check_multiplier),
        };
        interval.map_or(MAX_POLL_INTERVAL, |i| i.min(MAX_POLL_INTERVAL))
    }

    /// Cooldown window, capped at [`MAX_COOLDOWN_MINUTES`].
    pub fn cooldown(&self) -> chrono::Duration {
        let minutes = self.notification_cooldown_minutes.min(MAX_COOLDOWN_MINUTES) as i64;
        chrono::Duration::try_minutes(minutes).unwrap_or(chrono::Duration::MAX)
    }
}

/// What happened in one cycle.
#[derive(Debug)]
pub struct CycleReport {
    /// Events that passed the gate.
    pub decided: Vec<NotificationKind>,
    /// Events the notifier accepted.
    pub delivered: Vec<NotificationKind>,
    /// Events the notifier rejected.
    pub failed: Vec<NotificationKind>,
    /// Fetch failure, if the cycle did not observe a status.
    pub error: Option<Error>,
    /// State could not be saved; decisions still took effect in memory.
    pub persistence_error: Option<Error>,
    /// Mode after the cycle.
    pub mode: PollMode,
}

impl CycleReport {
    fn failed_fetch(error: Error, mode: PollMode) -> Self {
        Self {
            decided: Vec::new(),
            delivered: Vec::new(),
            failed: Vec::new(),
            error: Some(error),
            persistence_error: None,
            mode,
        }
    }

    /// Whether the cycle observed a status. A failed save does not count as failure.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Drives poll cycles on the injected clock.
pub struct PollScheduler {
    config: EngineConfig,
    fetcher: RetryingFetcher,
    tracker: StreamStateTracker,
    gate: NotificationGate,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    templates: NotificationTemplates,
    style: StyleOptions,
    clock: Arc<dyn Clock>,
    state: EngineState,
    mode: PollMode,
    next_wake_at: DateTime<Utc>,
}

impl PollScheduler {
    /// Create a scheduler resuming from `state`. The first poll is due immediately.
    pub fn new(
        config: EngineConfig,
        fetcher: RetryingFetcher,
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        state: EngineState,
    ) -> Self {
        let tracker = StreamStateTracker::new(config.viewer_milestone_thresholds.clone());
        let gate = NotificationGate::new(config.cooldown(), config.notify_on_game_change);
        let mode = PollMode::from_live(state.last_status.is_live);
        let next_wake_at = clock.now();

        Self {
            config,
            fetcher,
            tracker,
            gate,
            store,
            notifier,
            templates: NotificationTemplates::default(),
            style: StyleOptions::default(),
            clock,
            state,
            mode,
            next_wake_at,
        }
    }

    pub fn with_templates(mut self, templates: NotificationTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_style(mut self, style: StyleOptions) -> Self {
        self.style = style;
        self
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn mode(&self) -> PollMode {
        self.mode
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn next_wake_at(&self) -> DateTime<Utc> {
        self.next_wake_at
    }

    /// Time left until the next poll is due.
    pub fn time_until_next_poll(&self) -> Duration {
        (self.next_wake_at - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    fn schedule_next_poll(&mut self) {
        let interval = self.config.interval_for(self.mode);
        let step = chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::MAX);
        let now = self.clock.now();
        self.next_wake_at = now.checked_add_signed(step).unwrap_or(DateTime::<Utc>::MAX_UTC);
        debug!(
            mode = %self.mode,
            interval_secs = interval.as_secs(),
            next_wake_at = %self.next_wake_at,
            "Next poll scheduled"
        );
    }

    /// Run one cycle and schedule the next poll.
    pub async fn tick(&mut self) -> CycleReport {
        let report = self.run_cycle().await;
        self.schedule_next_poll();
        report
    }

    /// Run one cycle without touching the schedule.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let channel = self.config.channel.clone();

        let status = match self.fetcher.fetch_status(&channel).await {
            Ok(status) => status,
            Err(e) => {
                let attempts = match &e {
                    Error::FetchUnavailable { attempts, .. } => Some(*attempts),
                    _ => None,
                };
                warn!(
                    channel = %channel,
                    kind = e.kind(),
                    attempts,
                    mode = %self.mode,
                    error = %e,
                    "Status fetch failed, keeping current mode"
                );
                return CycleReport::failed_fetch(e, self.mode);
            }
        };

        let now = self.clock.now();
        let diff = self.tracker.update(&self.state, status);
        diff.apply_to(&mut self.state);
        let decided = self.gate.decide(&diff, &mut self.state, now);

        let mode = PollMode::from_live(self.state.last_status.is_live);
        if mode != self.mode {
            info!(channel = %channel, from = %self.mode, to = %mode, "Poll mode changed");
            self.mode = mode;
        }

        let persistence_error = match self.store.save(&self.state).await {
            Ok(()) => None,
            Err(e) => {
                error!(
                    channel = %channel,
                    error = %e,
                    "Failed to persist engine state, duplicates are possible after a restart"
                );
                Some(e)
            }
        };

        let (delivered, failed) = self.dispatch(&diff, &decided).await;

        CycleReport {
            decided,
            delivered,
            failed,
            error: None,
            persistence_error,
            mode: self.mode,
        }
    }

    async fn dispatch(
        &self,
        diff: &DiffResult,
        decided: &[NotificationKind],
    ) -> (Vec<NotificationKind>, Vec<NotificationKind>) {
        let mut delivered = Vec::new();
        let mut failed = Vec::new();

        for kind in decided {
            if self.config.silent_mode {
                info!(
                    event = kind.name(),
                    description = %kind,
                    "Silent mode, notification not sent"
                );
                continue;
            }

            let status = diff.status_for(kind);
            let template = self.templates.for_kind(kind);
            match self.notifier.send(kind, status, template, &self.style).await {
                Ok(()) => delivered.push(kind.clone()),
                Err(e) => {
                    error!(
                        event = kind.name(),
                        channel_type = self.notifier.channel_type(),
                        error = %e,
                        "Failed to deliver notification"
                    );
                    failed.push(kind.clone());
                }
            }
        }

        (delivered, failed)
    }

    /// Poll until `cancel` fires.
    ///
    /// A cycle in progress always completes; cancellation is observed while
    /// waiting for the next poll.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        info!(
            channel = %self.config.channel,
            mode = %self.mode,
            active_interval_secs = self.config.interval_for(PollMode::Active).as_secs(),
            idle_interval_secs = self.config.interval_for(PollMode::Idle).as_secs(),
            "Poll scheduler starting"
        );

        loop {
            let wait = self.time_until_next_poll();
            if !wait.is_zero() {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,
                    _ = self.clock.sleep(wait) => {}
                }
            }

            if cancel.is_cancelled() {
                break;
            }

            self.tick().await;
        }

        info!(channel = %self.config.channel, "Poll scheduler stopped");
        Ok(())
    }
}
