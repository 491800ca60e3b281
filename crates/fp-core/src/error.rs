//! Unified error type for framepipe.
//!
//! All crates funnel their failures into [`Error`]. Startup failures (probe,
//! geometry) are distinguished from decoder failures so the playback session
//! can record which stage failed, and the CLI can derive an exit code via
//! [`Error::exit_code`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error type covering all failure modes in framepipe.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Media probing failed or returned unusable data.
    #[error("Probe error: {0}")]
    Probe(String),

    /// The computed target size has a zero dimension.
    #[error("Invalid geometry: {width}x{height}")]
    InvalidGeometry {
        /// Computed target width.
        width: u32,
        /// Computed target height.
        height: u32,
    },

    /// A component was constructed with unusable parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The decode process exited unsuccessfully.
    #[error("Decode error (exit code {}): {message}", DisplayCode(.code))]
    Decode {
        /// Process exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Human-readable error description.
        message: String,
    },

    /// An external tool (ffmpeg, ffprobe) could not be run.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Caller input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

struct DisplayCode<'a>(&'a Option<i32>);

impl fmt::Display for DisplayCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "{code}"),
            None => write!(f, "signal"),
        }
    }
}

/// Serializable classification of an [`Error`], stored in failed session
/// states and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Probe,
    InvalidGeometry,
    InvalidConfiguration,
    Decode,
    Tool,
    Validation,
    Io,
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probe => write!(f, "probe"),
            Self::InvalidGeometry => write!(f, "invalid_geometry"),
            Self::InvalidConfiguration => write!(f, "invalid_configuration"),
            Self::Decode => write!(f, "decode"),
            Self::Tool => write!(f, "tool"),
            Self::Validation => write!(f, "validation"),
            Self::Io => write!(f, "io"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl FailureKind {
    /// Process exit code for the CLI.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Probe => 3,
            Self::InvalidGeometry => 4,
            Self::Decode => 5,
            Self::Tool => 6,
            Self::InvalidConfiguration | Self::Validation => 2,
            Self::Io | Self::Internal => 1,
        }
    }
}

impl Error {
    /// Map this error to a process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        self.failure_kind().exit_code()
    }

    /// Classify this error for state tracking.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Probe(_) => FailureKind::Probe,
            Error::InvalidGeometry { .. } => FailureKind::InvalidGeometry,
            Error::InvalidConfiguration(_) => FailureKind::InvalidConfiguration,
            Error::Decode { .. } => FailureKind::Decode,
            Error::Tool { .. } => FailureKind::Tool,
            Error::Validation(_) => FailureKind::Validation,
            Error::Io { .. } => FailureKind::Io,
            Error::Internal(_) => FailureKind::Internal,
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Decode`].
    pub fn decode(code: Option<i32>, message: impl Into<String>) -> Self {
        Error::Decode {
            code,
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::InvalidGeometry`].
    pub fn geometry(width: u32, height: u32) -> Self {
        Error::InvalidGeometry { width, height }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
