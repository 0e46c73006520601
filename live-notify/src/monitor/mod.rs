//! Stream monitoring and notification gating.
//!
//! One poll cycle flows through these pieces in order:
//!
//! 1. [`RetryingFetcher`] obtains a [`StreamStatus`](crate::domain::StreamStatus)
//!    from a [`StatusSource`], retrying transient failures
//! 2. [`StreamStateTracker`] diffs it against the persisted [`EngineState`]
//! 3. [`NotificationGate`] applies cooldown and policy to the candidate events
//! 4. [`StateStore`] persists the result

pub mod events;
pub mod fetcher;
pub mod gate;
pub mod helix;
pub mod state_store;
pub mod tracker;

pub use events::NotificationKind;
pub use fetcher::{FailureClass, RetryingFetcher, SourceError, StatusSource};
pub use gate::NotificationGate;
pub use helix::HelixStatusSource;
pub use state_store::{
    EngineState, JsonFileStateStore, MemoryStateStore, STATE_VERSION, StateStore,
};
pub use tracker::{DiffResult, StreamStateTracker};
