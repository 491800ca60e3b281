//! fp-core: shared errors, configuration, media value types, and events.
//!
//! This crate is the foundational dependency for all other fp-* crates,
//! providing the unified error type, the JSON configuration model, the
//! geometry and stream descriptions passed between probing, scaling, and
//! decoding, and a broadcast bus for playback lifecycle events.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;
pub mod state;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, FailureKind, Result};
pub use ids::SessionId;
pub use media::*;
pub use state::{Failure, PlaybackState};
