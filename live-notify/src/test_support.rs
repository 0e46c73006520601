//! Scripted fakes for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::credentials::{AuthError, Credential, CredentialSource};
use crate::domain::StreamStatus;
use crate::monitor::{NotificationKind, SourceError, StatusSource};
use crate::notification::{MessageTemplate, Notifier, StyleOptions};
use crate::{Error, Result};

pub fn fixed_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
}

/// Replays a fixed list of refresh results, then an optional fallback.
pub struct ScriptedCredentialSource {
    script: Mutex<VecDeque<std::result::Result<Credential, AuthError>>>,
    fallback: Option<Credential>,
    calls: AtomicUsize,
}

impl ScriptedCredentialSource {
    pub fn new(script: Vec<std::result::Result<Credential, AuthError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always hands out the same token.
    pub fn always(token: &str, expires_at: DateTime<Utc>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(Credential::new(token, expires_at)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for ScriptedCredentialSource {
    async fn refresh(
        &self,
        _client_id: &str,
        _client_secret: &str,
    ) -> std::result::Result<Credential, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(result) => result,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| AuthError::RefreshFailed("script exhausted".to_string())),
        }
    }
}

/// Replays scripted fetch and probe results.
pub struct ScriptedStatusSource {
    script: Mutex<VecDeque<std::result::Result<StreamStatus, SourceError>>>,
    probes: Mutex<VecDeque<std::result::Result<(), SourceError>>>,
    fetch_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    cancel_when_drained: Option<CancellationToken>,
}

impl ScriptedStatusSource {
    pub fn new(script: Vec<std::result::Result<StreamStatus, SourceError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            probes: Mutex::new(VecDeque::new()),
            fetch_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            cancel_when_drained: None,
        }
    }

    /// Probe results; once exhausted probes succeed.
    pub fn with_probes(self, probes: Vec<std::result::Result<(), SourceError>>) -> Self {
        *self.probes.lock() = probes.into();
        self
    }

    /// Cancel `token` when the last scripted fetch result is handed out.
    pub fn cancel_when_drained(mut self, token: CancellationToken) -> Self {
        self.cancel_when_drained = Some(token);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for ScriptedStatusSource {
    async fn fetch_status(
        &self,
        _channel: &str,
        _credential: &Credential,
    ) -> std::result::Result<StreamStatus, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let (next, drained) = {
            let mut script = self.script.lock();
            let next = script.pop_front();
            (next, script.is_empty())
        };
        if drained && let Some(token) = &self.cancel_when_drained {
            token.cancel();
        }
        next.unwrap_or_else(|| Err(SourceError::Network("script exhausted".to_string())))
    }

    async fn probe(&self) -> std::result::Result<(), SourceError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.probes.lock().pop_front().unwrap_or(Ok(()))
    }
}

/// Records every send; can be told to fail for given event names.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(NotificationKind, StreamStatus)>>,
    failing: Mutex<Vec<&'static str>>,
    attempts: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send whose [`NotificationKind::name`] equals `name`.
    pub fn fail_on(&self, name: &'static str) {
        self.failing.lock().push(name);
    }

    pub fn sent(&self) -> Vec<(NotificationKind, StreamStatus)> {
        self.sent.lock().clone()
    }

    pub fn sent_kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().iter().map(|(kind, _)| kind.clone()).collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel_type(&self) -> &'static str {
        "recording"
    }

    async fn send(
        &self,
        kind: &NotificationKind,
        status: &StreamStatus,
        _template: &MessageTemplate,
        _style: &StyleOptions,
    ) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(&kind.name()) {
            return Err(Error::notification(format!("refusing {}", kind.name())));
        }
        self.sent.lock().push((kind.clone(), status.clone()));
        Ok(())
    }
}
