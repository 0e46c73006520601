//! Application-wide error types.

use thiserror::Error;

use crate::credentials::AuthError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
///
/// None of the engine variants are fatal to the process: the scheduler logs them
/// and attempts the next tick.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Upstream unavailable after {attempts} attempts: {last_error}")]
    FetchUnavailable { attempts: u32, last_error: String },

    #[error("Invalid upstream response: {0}")]
    FetchInvalidResponse(String),

    #[error("State persistence failed: {0}")]
    Persistence(String),

    #[error("Notification delivery failed: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Short machine-friendly label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::FetchUnavailable { .. } => "fetch_unavailable",
            Self::FetchInvalidResponse(_) => "fetch_invalid_response",
            Self::Persistence(_) => "persistence",
            Self::Notification(_) => "notification",
            Self::Configuration(_) => "configuration",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}
