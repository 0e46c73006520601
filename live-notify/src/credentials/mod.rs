//! Credential management for the upstream status API.
//!
//! - [`Credential`]: an access token and the instant it stops being usable
//! - [`CredentialSource`]: obtains a fresh credential from the identity provider
//! - [`AuthProvider`]: caches the current credential and refreshes it on demand
//! - [`TwitchCredentialSource`]: Twitch client-credentials grant

mod error;
mod provider;
mod twitch;

pub use error::AuthError;
pub use provider::{AuthProvider, Credential, CredentialSource};
pub use twitch::{TwitchCredentialSource, redact_secret};
