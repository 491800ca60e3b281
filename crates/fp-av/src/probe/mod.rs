//! Stream probing.
//!
//! [`StreamProbe`] is the seam between playback and whatever tool reports a
//! source's intrinsic dimensions. [`FfprobeProbe`] is the production
//! implementation.

pub mod ffprobe;

pub use self::ffprobe::FfprobeProbe;

use std::path::Path;

use async_trait::async_trait;
use fp_core::MediaInfo;

/// Reports the dimensions and frame rate of a source's first video stream.
///
/// Implementations must be safe to share across tasks (`Send + Sync`).
#[async_trait]
pub trait StreamProbe: Send + Sync {
    /// Human-readable name identifying this probe implementation.
    fn name(&self) -> &'static str;

    /// Probe the file at `path`.
    ///
    /// Fails with [`fp_core::Error::Probe`] when the tool fails or its output
    /// is unusable. Never retries.
    async fn probe(&self, path: &Path) -> fp_core::Result<MediaInfo>;
}
