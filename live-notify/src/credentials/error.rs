//! Credential error types.

use thiserror::Error;

/// Errors that can occur while obtaining or using an access credential.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity provider rejected the client id or secret.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Token endpoint returned an unexpected status.
    #[error("Refresh failed: {0}")]
    RefreshFailed(String),

    /// Network error talking to the token endpoint.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Token endpoint response did not match the expected shape.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Upstream rejected a freshly refreshed token.
    #[error("Token rejected by upstream (HTTP {status})")]
    Rejected { status: u16 },
}

impl AuthError {
    /// Check if this error requires the operator to fix the configured credentials.
    pub fn requires_reconfigure(&self) -> bool {
        matches!(self, Self::InvalidCredentials(_) | Self::Rejected { .. })
    }

    /// Check if this error is transient and may succeed on a later cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RefreshFailed(_))
    }
}
