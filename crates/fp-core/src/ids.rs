//! Decode-run identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one decode run of a playback session.
///
/// Every successful start issues a fresh ID, so events emitted by a torn-down
/// run can be told apart from those of the run that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        let mut buf = Uuid::encode_buffer();
        let simple = self.0.simple().encode_lower(&mut buf);
        simple[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str(&self.short())
        } else {
            write!(f, "{}", self.0)
        }
    }
}
