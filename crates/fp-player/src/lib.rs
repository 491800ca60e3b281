//! # fp-player
//!
//! Playback orchestration: probe a source, fit it to a viewport, run the
//! decoder, and deliver assembled frames to a [`FrameSink`].
//!
//! - [`PlaybackSession`] is the state machine, usable directly from one task.
//! - [`Player`] runs a session on its own task behind a [`PlayerHandle`],
//!   handling start/resize/stop commands while frames stream.

pub mod player;
pub mod session;
pub mod sink;

pub use player::{Player, PlayerHandle};
pub use session::{PlaybackSession, Progress, SessionStats};
pub use sink::FrameSink;
