//! Twitch client-credentials grant.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{AuthError, Credential, CredentialSource};
use crate::scheduler::Clock;

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Tokens are treated as expired this long before Twitch says they are.
const EXPIRY_BUFFER_SECS: i64 = 600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

/// Fetches app access tokens from the Twitch identity endpoint.
pub struct TwitchCredentialSource {
    client: Client,
    clock: Arc<dyn Clock>,
    token_url: String,
    debug_api: bool,
}

impl TwitchCredentialSource {
    pub fn new(client: Client, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            clock,
            token_url: TOKEN_URL.to_string(),
            debug_api: false,
        }
    }

    /// Log token requests with the secret redacted.
    pub fn with_debug_api(mut self, enabled: bool) -> Self {
        self.debug_api = enabled;
        self
    }

    /// Override the token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }
}

#[async_trait]
impl CredentialSource for TwitchCredentialSource {
    #[instrument(skip(self, client_secret))]
    async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Credential, AuthError> {
        if self.debug_api {
            debug!(
                url = %self.token_url,
                client_id,
                client_secret = %redact_secret(client_secret),
                grant_type = "client_credentials",
                "Token request"
            );
        }

        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "client_credentials"),
        ];

        let response = self.client.post(&self.token_url).form(&params).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Token endpoint returned an error");
            if self.debug_api {
                debug!(body = %body, "Token error body");
            }
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    AuthError::InvalidCredentials(format!("HTTP {}: {}", status.as_u16(), body))
                }
                _ => AuthError::RefreshFailed(format!("HTTP {}: {}", status.as_u16(), body)),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ParseError(e.to_string()))?;

        if token.access_token.is_empty() {
            return Err(AuthError::ParseError(
                "token response has an empty access_token".to_string(),
            ));
        }

        let now = self.clock.now();
        if token.expires_in <= EXPIRY_BUFFER_SECS {
            warn!(
                expires_in = token.expires_in,
                "Token lifetime is shorter than the refresh buffer"
            );
        }
        let expires_at = now
            .checked_add_signed(usable_lifetime(token.expires_in))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        if self.debug_api {
            debug!(expires_in = token.expires_in, %expires_at, "Token response");
        }

        Ok(Credential::new(token.access_token, expires_at))
    }
}

/// How long a token with the given lifetime is used before refreshing.
///
/// Normally `expires_in` minus the refresh buffer; short-lived tokens are used
/// for half their lifetime so they are not refreshed on every call.
fn usable_lifetime(expires_in: i64) -> Duration {
    let secs = if expires_in > 2 * EXPIRY_BUFFER_SECS {
        expires_in - EXPIRY_BUFFER_SECS
    } else {
        expires_in / 2
    };
    Duration::try_seconds(secs.max(0)).unwrap_or(Duration::MAX)
}

/// Redact a secret for logging: first and last four characters only.
pub fn redact_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}
