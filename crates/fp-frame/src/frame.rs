//! A single decoded frame.

use bytes::Bytes;

/// One complete image worth of raw pixel bytes.
///
/// The bytes are a reference-counted view into the assembler's buffer; a
/// sink that needs the pixels beyond its render call can keep the frame
/// (cheap clone) or copy [`Frame::data`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    sequence: u64,
    data: Bytes,
}

impl Frame {
    pub(crate) fn new(sequence: u64, data: Bytes) -> Self {
        Self { sequence, data }
    }

    /// Zero-based position of this frame in its decode run.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Raw pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Take ownership of the underlying bytes.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}
