//! Cached access credential with on-demand refresh.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::AuthError;
use crate::scheduler::Clock;

/// An access token and the instant after which it must not be used.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Whether the token can still be used at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Obtains a fresh credential from the identity provider.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn refresh(&self, client_id: &str, client_secret: &str)
    -> Result<Credential, AuthError>;
}

/// Holds the current credential for the upstream API.
///
/// The cache lock is never held across an await point.
pub struct AuthProvider {
    client_id: String,
    client_secret: String,
    source: Arc<dyn CredentialSource>,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<Credential>>,
}

impl AuthProvider {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        source: Arc<dyn CredentialSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            source,
            clock,
            cached: Mutex::new(None),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Return a usable credential, refreshing it on first use or after expiry.
    #[instrument(skip(self))]
    pub async fn get_token(&self) -> Result<Credential, AuthError> {
        let now = self.clock.now();
        let cached = self.cached.lock().clone();
        if let Some(credential) = cached.filter(|c| c.is_valid_at(now)) {
            return Ok(credential);
        }

        debug!("Refreshing access token");
        let credential = self
            .source
            .refresh(&self.client_id, &self.client_secret)
            .await?;
        info!(expires_at = %credential.expires_at, "Obtained new access token");

        *self.cached.lock() = Some(credential.clone());
        Ok(credential)
    }

    /// Drop the cached credential so the next `get_token` refreshes.
    pub fn invalidate(&self) {
        if self.cached.lock().take().is_some() {
            debug!("Access token invalidated");
        }
    }

    /// Whether a credential is currently cached, valid or not.
    pub fn has_cached(&self) -> bool {
        self.cached.lock().is_some()
    }
}
