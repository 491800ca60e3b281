//! FFprobe-based [`StreamProbe`] implementation.
//!
//! Shells out to
//! `ffprobe -v error -select_streams v:0 -count_packets -show_entries stream=width,height,avg_frame_rate -of json`
//! and maps the first entry of `streams` into [`MediaInfo`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use fp_core::{FrameRate, MediaInfo};
use serde::Deserialize;

use super::StreamProbe;
use crate::command::ToolCommand;
use crate::tools::{Tool, ToolRegistry};

/// Default time allowed for one ffprobe run.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A probe backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    /// Path to the ffprobe binary.
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProbe {
    /// Create a new probe using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self {
            ffprobe_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a probe that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe").ok().map(Self::new)
    }

    /// Create a probe from a discovered registry.
    pub fn from_registry(tools: &ToolRegistry) -> fp_core::Result<Self> {
        Ok(Self::new(tools.require(Tool::Ffprobe)?.path.clone()))
    }

    /// Override the per-run timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, path: &Path) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.timeout(self.timeout);
        cmd.args([
            "-v", "error",
            "-select_streams", "v:0",
            "-count_packets",
            "-show_entries", "stream=width,height,avg_frame_rate",
            "-of", "json",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());
        cmd
    }
}

#[async_trait]
impl StreamProbe for FfprobeProbe {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> fp_core::Result<MediaInfo> {
        tracing::debug!("Probing {}", path.display());

        let output = self.command(path).execute().await.map_err(|e| match e {
            fp_core::Error::Tool { message, .. } => {
                fp_core::Error::Probe(format!("ffprobe failed: {message}"))
            }
            other => other,
        })?;

        let info = parse_ffprobe_output(path, &output.stdout)?;
        tracing::info!(
            "Probed {}: {}x{} @ {}",
            path.display(),
            info.width,
            info.height,
            info.frame_rate
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown fps".into())
        );
        Ok(info)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    streams: Option<Vec<FfprobeStream>>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    nb_read_packets: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Map raw ffprobe JSON to [`MediaInfo`].
///
/// Zero dimensions are passed through; rejecting them is the caller's job
/// once the target size is known.
fn parse_ffprobe_output(path: &Path, json: &str) -> fp_core::Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| fp_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let streams = output
        .streams
        .ok_or_else(|| fp_core::Error::Probe("ffprobe output has no streams array".into()))?;

    let stream = streams.into_iter().next().ok_or_else(|| {
        fp_core::Error::Probe(format!("no video stream in {}", path.display()))
    })?;

    let width = stream
        .width
        .ok_or_else(|| fp_core::Error::Probe("video stream has no width".into()))?;
    let height = stream
        .height
        .ok_or_else(|| fp_core::Error::Probe("video stream has no height".into()))?;

    Ok(MediaInfo {
        file_path: path.to_path_buf(),
        width,
        height,
        frame_rate: stream.avg_frame_rate.as_deref().and_then(FrameRate::parse),
        packet_count: stream.nb_read_packets.and_then(|s| s.parse().ok()),
    })
}
