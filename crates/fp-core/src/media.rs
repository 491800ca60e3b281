//! Media value types shared between probing, scaling, and decoding.
//!
//! All types are small `Copy` values that serialize with `serde` and
//! implement `Display` manually for consistent log output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// PixelFormat
// ---------------------------------------------------------------------------

/// Raw pixel layout requested from the decoder.
///
/// Only packed RGBA is supported; the enum exists so the decoder argument
/// and the frame stride derive from one place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Rgba,
}

impl PixelFormat {
    /// Bytes occupied by a single pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba => 4,
        }
    }

    /// Name understood by ffmpeg's `-pix_fmt` option.
    pub const fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::Rgba => "rgba",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

// ---------------------------------------------------------------------------
// FrameRate
// ---------------------------------------------------------------------------

/// A rational frame rate as reported by ffprobe (`30000/1001`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    /// Frames per second as a float.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Parse an ffprobe rate string.
    ///
    /// Accepts `num/den` or a plain integer. Returns `None` for `0/0`, a zero
    /// numerator, or anything unparseable.
    pub fn parse(rate: &str) -> Option<Self> {
        let rate = rate.trim();
        let (num, den) = match rate.split_once('/') {
            Some((n, d)) => (n.trim().parse::<u32>().ok()?, d.trim().parse::<u32>().ok()?),
            None => (rate.parse::<u32>().ok()?, 1),
        };
        if num == 0 || den == 0 {
            return None;
        }
        Some(Self { num, den })
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{} ({:.3})", self.num, self.den, self.as_f64())
        }
    }
}

// ---------------------------------------------------------------------------
// MediaInfo
// ---------------------------------------------------------------------------

/// Intrinsic properties of the first video stream of a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Path that was probed.
    pub file_path: PathBuf,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Average frame rate, if the container reports one.
    pub frame_rate: Option<FrameRate>,
    /// Number of packets counted in the stream, if available.
    pub packet_count: Option<u64>,
}

// ---------------------------------------------------------------------------
// Viewport
// ---------------------------------------------------------------------------

/// Bounding box that decoded output must fit inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parses `WxH` (also accepts `X` and `:` separators).
impl FromStr for Viewport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (w, h) = s
            .split_once(['x', 'X', ':'])
            .ok_or_else(|| Error::Validation(format!("viewport '{s}' is not WxH")))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::Validation(format!("viewport width '{w}': {e}")))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::Validation(format!("viewport height '{h}': {e}")))?;
        Ok(Self { width, height })
    }
}

// ---------------------------------------------------------------------------
// TargetSize
// ---------------------------------------------------------------------------

/// Output dimensions the decoder is asked to scale to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero.
    pub const fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Size in bytes of one frame at this resolution.
    pub fn frame_size(&self, format: PixelFormat) -> usize {
        self.width as usize * self.height as usize * format.bytes_per_pixel()
    }

    /// Reject degenerate sizes with [`Error::InvalidGeometry`].
    pub fn validate(self) -> Result<Self> {
        if self.is_degenerate() {
            return Err(Error::geometry(self.width, self.height));
        }
        Ok(self)
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
