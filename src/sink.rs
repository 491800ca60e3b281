//! A sink that measures playback instead of drawing it.

use std::time::{Duration, Instant};

use fp_core::TargetSize;
use fp_frame::Frame;
use fp_player::FrameSink;
use sha2::{Digest, Sha256};

/// Totals reported when playback ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub frames: u64,
    pub bytes: u64,
    pub surfaces: u32,
    pub elapsed: Duration,
}

impl Summary {
    pub fn frames_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// Counts frames and bytes, logs cadence, and fingerprints each frame at
/// trace level.
pub struct StatsSink {
    report_every: u64,
    frames: u64,
    bytes: u64,
    surfaces: u32,
    started: Option<Instant>,
    last_frame: Option<Instant>,
}

impl StatsSink {
    /// Log a cadence line every `report_every` frames (0 disables).
    pub fn new(report_every: u64) -> Self {
        Self {
            report_every,
            frames: 0,
            bytes: 0,
            surfaces: 0,
            started: None,
            last_frame: None,
        }
    }

    pub fn summary(&self) -> Summary {
        let elapsed = match (self.started, self.last_frame) {
            (Some(start), Some(last)) => last.duration_since(start),
            _ => Duration::ZERO,
        };
        Summary {
            frames: self.frames,
            bytes: self.bytes,
            surfaces: self.surfaces,
            elapsed,
        }
    }
}

impl FrameSink for StatsSink {
    fn configure(&mut self, target: TargetSize) {
        tracing::info!("Output surface is {target}");
        self.surfaces += 1;
    }

    fn render(&mut self, frame: &Frame, size: TargetSize) {
        let now = Instant::now();
        self.started.get_or_insert(now);
        self.last_frame = Some(now);
        self.frames += 1;
        self.bytes += frame.len() as u64;

        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(
                sequence = frame.sequence(),
                fingerprint = %fingerprint(frame.data()),
                "Frame {size}"
            );
        }

        if self.report_every > 0 && self.frames % self.report_every == 0 {
            let fps = self.summary().frames_per_second();
            tracing::debug!("{} frames at {size} ({fps:.1} fps)", self.frames);
        }
    }
}

/// Short content fingerprint: the first 8 bytes of the SHA-256 digest.
fn fingerprint(data: &[u8]) -> String {
    hex::encode(&Sha256::digest(data)[..8])
}
