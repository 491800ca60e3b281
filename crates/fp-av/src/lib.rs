//! # fp-av
//!
//! External tool management, stream probing, and raw-video decoding for
//! framepipe.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for captured runs, and piped spawning for streaming runs.
//! - **Probing** ([`StreamProbe`], [`FfprobeProbe`]) -- dimensions and frame
//!   rate of the first video stream.
//! - **Decoding** ([`Decoder`], [`FfmpegDecoder`], [`DecodeSession`]) -- a
//!   running decoder exposed as a bounded channel of raw byte chunks plus a
//!   final exit report.

pub mod command;
pub mod decode;
pub mod probe;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use decode::{DecodeEvent, DecodeExit, DecodeProducer, DecodeSession, Decoder, FfmpegDecoder};
pub use probe::{FfprobeProbe, StreamProbe};
pub use tools::{Tool, ToolConfig, ToolInfo, ToolRegistry, ToolSource};
