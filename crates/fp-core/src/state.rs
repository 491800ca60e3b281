//! Playback lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, FailureKind};

/// Why a session ended up in [`PlaybackState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

impl From<&Error> for Failure {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.failure_kind(),
            message: err.to_string(),
        }
    }
}

/// State of a playback session.
///
/// `Idle → Probing → Starting → Streaming → Stopping → Idle`, with `Failed`
/// reachable from anywhere. A failed session stays failed until the next
/// explicit start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Probing,
    Starting,
    Streaming,
    Stopping,
    Failed(Failure),
}

impl PlaybackState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// The failure kind, if this is a failed state.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failed(f) => Some(f.kind),
            _ => None,
        }
    }

    /// Short lowercase name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::Starting => "starting",
            Self::Streaming => "streaming",
            Self::Stopping => "stopping",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(failure) => write!(f, "failed({}: {})", failure.kind, failure.message),
            other => f.write_str(other.name()),
        }
    }
}
