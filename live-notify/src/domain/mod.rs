//! Domain types shared across the engine.
//!
//! Status snapshots and value objects live here; nothing in this module does I/O.

pub mod status;
pub mod value_objects;

pub use status::{LiveStatusBuilder, SessionId, StreamStatus};
pub use value_objects::*;
