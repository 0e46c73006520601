//! live-notify library crate.
//!
//! Watches one Twitch channel and turns noisy status polls into a small set of
//! deduplicated notifications. The binary wires these modules together; they
//! are exposed here for integration testing.

pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod scheduler;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
