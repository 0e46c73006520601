//! Upstream status fetch with bounded retry.
//!
//! Failures fall into three classes:
//! - transient (network, 5xx, 429): retried with exponential backoff
//! - unauthorized (401/403): token refreshed and the call retried once
//! - invalid (other 4xx, schema mismatch): returned immediately

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::credentials::{AuthError, AuthProvider, Credential};
use crate::domain::{RetryPolicy, StreamStatus};
use crate::scheduler::Clock;
use crate::{Error, Result};

/// Error reported by a [`StatusSource`].
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

/// How the fetcher reacts to a [`SourceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Unauthorized,
    Invalid,
}

impl SourceError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Network(_) => FailureClass::Transient,
            Self::Status { code, .. } => match *code {
                401 | 403 => FailureClass::Unauthorized,
                408 | 429 | 500..=599 => FailureClass::Transient,
                _ => FailureClass::Invalid,
            },
            Self::Decode(_) => FailureClass::Invalid,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Upstream "get current status" call.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(
        &self,
        channel: &str,
        credential: &Credential,
    ) -> std::result::Result<StreamStatus, SourceError>;

    /// Cheap reachability check. Sources without one report reachable.
    async fn probe(&self) -> std::result::Result<(), SourceError> {
        Ok(())
    }
}

/// Wraps a [`StatusSource`] with auth handling and retry.
pub struct RetryingFetcher {
    source: Arc<dyn StatusSource>,
    auth: Arc<AuthProvider>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    probe_enabled: bool,
}

impl RetryingFetcher {
    pub fn new(
        source: Arc<dyn StatusSource>,
        auth: Arc<AuthProvider>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            source,
            auth,
            clock,
            policy,
            probe_enabled: false,
        }
    }

    /// Probe reachability before the first real call of each cycle.
    pub fn with_probe(mut self, enabled: bool) -> Self {
        self.probe_enabled = enabled;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch the current status of `channel`.
    #[instrument(skip(self))]
    pub async fn fetch_status(&self, channel: &str) -> Result<StreamStatus> {
        let mut credential = self.auth.get_token().await?;

        let mut probe_backoff = self.policy.backoff();
        let mut call_backoff = self.policy.backoff();
        let mut reachable = !self.probe_enabled;
        let mut real_attempts = 0u32;
        let mut reauthenticated = false;

        loop {
            if !reachable {
                match self.source.probe().await {
                    Ok(()) => reachable = true,
                    Err(e) => {
                        let Some(delay) = probe_backoff.record_failure() else {
                            warn!(
                                channel,
                                probes = probe_backoff.attempts(),
                                error = %e,
                                "Upstream unreachable, giving up this cycle"
                            );
                            return Err(Error::FetchUnavailable {
                                attempts: real_attempts,
                                last_error: e.to_string(),
                            });
                        };
                        debug!(
                            channel,
                            probe = probe_backoff.attempts(),
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Reachability probe failed, backing off"
                        );
                        self.clock.sleep(delay).await;
                        continue;
                    }
                }
            }

            real_attempts += 1;
            let err = match self.source.fetch_status(channel, &credential).await {
                Ok(status) => {
                    if real_attempts > 1 {
                        debug!(channel, attempts = real_attempts, "Fetch succeeded after retry");
                    }
                    return Ok(status.normalized());
                }
                Err(e) => e,
            };

            match err.class() {
                FailureClass::Unauthorized => {
                    let status = err.status_code().unwrap_or(401);
                    if reauthenticated {
                        return Err(Error::Auth(AuthError::Rejected { status }));
                    }
                    warn!(channel, status, "Upstream rejected token, refreshing");
                    reauthenticated = true;
                    self.auth.invalidate();
                    credential = self.auth.get_token().await?;
                }
                FailureClass::Invalid => {
                    return Err(Error::FetchInvalidResponse(err.to_string()));
                }
                FailureClass::Transient => {
                    let Some(delay) = call_backoff.record_failure() else {
                        return Err(Error::FetchUnavailable {
                            attempts: real_attempts,
                            last_error: err.to_string(),
                        });
                    };
                    warn!(
                        channel,
                        attempt = call_backoff.attempts(),
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient fetch failure, retrying"
                    );
                    self.clock.sleep(delay).await;
                }
            }
        }
    }
}
