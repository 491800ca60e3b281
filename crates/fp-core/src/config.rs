//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! tool overrides and playback tuning. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::media::Viewport;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub playback: PlaybackConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    ///
    /// This is intentionally string-based so the caller can read the file
    /// however it sees fit.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Load configuration strictly: a missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.playback.read_chunk_size == 0 {
            warnings.push("playback.read_chunk_size is 0; decoder output cannot be read".into());
        }

        if self.playback.max_pending_chunks == 0 {
            warnings.push(
                "playback.max_pending_chunks is 0; the chunk channel needs capacity >= 1".into(),
            );
        }

        if self.playback.viewport.width == 0 || self.playback.viewport.height == 0 {
            warnings.push(format!(
                "playback.viewport {} has a zero dimension; playback will fail with invalid geometry",
                self.playback.viewport
            ));
        }

        if self.playback.probe_timeout_secs == 0 {
            warnings.push("playback.probe_timeout_secs is 0; every probe will time out".into());
        }

        for (name, path) in [
            ("ffmpeg_path", self.tools.ffmpeg_path.as_deref()),
            ("ffprobe_path", self.tools.ffprobe_path.as_deref()),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "tools.{name} {} does not exist; falling back to PATH",
                        p.display()
                    ));
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Playback pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Bytes requested per read from the decoder's stdout.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    /// Capacity of the chunk channel between the stdout reader and the
    /// session. When full, the reader stops reading and the pipe stalls the
    /// decoder.
    #[serde(default = "default_max_pending_chunks")]
    pub max_pending_chunks: usize,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Grace period for a terminated decoder to be reaped.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_ms: u64,
    /// Default bounds used when no viewport is given.
    pub viewport: Viewport,
}

fn default_read_chunk_size() -> usize {
    64 * 1024
}
fn default_max_pending_chunks() -> usize {
    32
}
fn default_probe_timeout() -> u64 {
    30
}
fn default_stop_timeout() -> u64 {
    2000
}

impl PlaybackConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Upper bound on bytes held between the decoder pipe and the assembler,
    /// excluding the assembler's own partial frame.
    pub fn max_buffered_bytes(&self) -> usize {
        self.read_chunk_size.saturating_mul(self.max_pending_chunks)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: default_read_chunk_size(),
            max_pending_chunks: default_max_pending_chunks(),
            probe_timeout_secs: default_probe_timeout(),
            stop_timeout_ms: default_stop_timeout(),
            viewport: Viewport::default(),
        }
    }
}
