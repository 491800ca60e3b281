//! Fixed-size frame assembly over a chunked byte stream.
//!
//! The decoder writes raw pixels to a pipe and the pipe hands them over in
//! whatever chunk sizes the OS picks. [`FrameAssembler`] buffers those chunks
//! and slices complete frames off the front of the buffer in arrival order.
//!
//! Frames are split off a single `BytesMut` with `split_to`, which advances
//! the buffer's start without copying. Once the frames handed out have been
//! dropped, the next `append` reclaims the freed storage, so a steady-state
//! stream reuses one allocation instead of growing or copying per frame.

use bytes::BytesMut;
use fp_core::{Error, PixelFormat, Result, TargetSize};

use crate::frame::Frame;

/// Largest frame accepted: a 16384x16384 RGBA image.
pub const MAX_FRAME_SIZE: usize = 16384 * 16384 * 4;

/// Storage reserved up front; the buffer grows as chunks arrive.
const INITIAL_CAPACITY: usize = 64 * 1024;

/// Accumulates byte chunks and emits complete frames of `frame_size` bytes.
///
/// Residual bytes (fewer than one frame) stay buffered across calls and are
/// never reordered. There is no upper bound on the buffer: the caller bounds
/// it by draining after every append and by limiting how much it reads ahead.
#[derive(Debug)]
pub struct FrameAssembler {
    frame_size: usize,
    buffer: BytesMut,
    next_sequence: u64,
    bytes_appended: u64,
}

impl FrameAssembler {
    /// Create an assembler for frames of exactly `frame_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `frame_size` is zero or
    /// above [`MAX_FRAME_SIZE`].
    pub fn new(frame_size: usize) -> Result<Self> {
        if frame_size == 0 {
            return Err(Error::InvalidConfiguration(
                "frame size must be greater than zero".into(),
            ));
        }
        if frame_size > MAX_FRAME_SIZE {
            return Err(Error::InvalidConfiguration(format!(
                "frame size of {frame_size} bytes exceeds the {MAX_FRAME_SIZE} byte limit"
            )));
        }
        Ok(Self {
            frame_size,
            buffer: BytesMut::with_capacity(frame_size.min(INITIAL_CAPACITY)),
            next_sequence: 0,
            bytes_appended: 0,
        })
    }

    /// Create an assembler sized for `target` in the given pixel format.
    pub fn for_target(target: TargetSize, format: PixelFormat) -> Result<Self> {
        let frame_size = (target.width as usize)
            .checked_mul(target.height as usize)
            .and_then(|px| px.checked_mul(format.bytes_per_pixel()))
            .ok_or_else(|| {
                Error::InvalidConfiguration(format!("frame size for {target} overflows"))
            })?;
        Self::new(frame_size)
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Bytes received but not yet emitted as part of a frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of frames emitted so far.
    pub fn frames_emitted(&self) -> u64 {
        self.next_sequence
    }

    /// Total bytes appended since construction or the last reset.
    pub fn bytes_appended(&self) -> u64 {
        self.bytes_appended
    }

    /// Append a chunk of any size (including empty).
    pub fn append(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.buffer.extend_from_slice(chunk);
        self.bytes_appended += chunk.len() as u64;
    }

    /// Iterate over every complete frame currently buffered.
    ///
    /// Running the iterator to completion leaves fewer than `frame_size`
    /// bytes buffered. Dropping it early leaves the remaining frames in
    /// place for the next call.
    pub fn drain(&mut self) -> Drain<'_> {
        Drain { assembler: self }
    }

    /// [`append`](Self::append) followed by [`drain`](Self::drain).
    pub fn push(&mut self, chunk: &[u8]) -> Drain<'_> {
        self.append(chunk);
        self.drain()
    }

    /// Discard all buffered bytes and restart sequence numbering.
    ///
    /// Returns the number of bytes discarded.
    pub fn reset(&mut self) -> usize {
        let discarded = self.buffer.len();
        self.buffer.clear();
        self.next_sequence = 0;
        self.bytes_appended = 0;
        discarded
    }

    /// Consume the assembler at end of stream.
    ///
    /// Returns the number of trailing bytes that never formed a complete
    /// frame. Those bytes are dropped.
    pub fn finish(self) -> usize {
        self.buffer.len()
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.buffer.len() < self.frame_size {
            return None;
        }
        let data = self.buffer.split_to(self.frame_size).freeze();
        let frame = Frame::new(self.next_sequence, data);
        self.next_sequence += 1;
        Some(frame)
    }
}

/// Lazy iterator over complete frames, returned by [`FrameAssembler::drain`].
#[derive(Debug)]
pub struct Drain<'a> {
    assembler: &'a mut FrameAssembler,
}

impl Iterator for Drain<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.assembler.next_frame()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.assembler.buffer.len() / self.assembler.frame_size;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Drain<'_> {}
