//! Scheduling of poll cycles.
//!
//! A single [`PollScheduler`] drives the engine on one logical timeline: a cycle
//! completes before the next one is scheduled, and all waiting goes through the
//! injected [`Clock`].

mod clock;
mod poll;

pub use clock::{Clock, ManualClock, SystemClock};
pub use poll::{
    CycleReport, EngineConfig, MAX_COOLDOWN_MINUTES, MAX_POLL_INTERVAL, PollMode, PollScheduler,
};
