//! Frame consumers.

use fp_core::TargetSize;
use fp_frame::Frame;

/// Receives every complete frame of a playback session, in order.
///
/// Calls are synchronous: the session does not read further decoder output
/// until `render` returns. The frame's bytes stay valid for as long as the
/// sink keeps the [`Frame`]; sinks that only draw can let it go on return.
pub trait FrameSink: Send {
    /// Called once per decode run, before its first frame.
    fn configure(&mut self, _target: TargetSize) {}

    /// Render one frame of `size.width * size.height * 4` RGBA bytes.
    fn render(&mut self, frame: &Frame, size: TargetSize);
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn configure(&mut self, target: TargetSize) {
        (**self).configure(target);
    }

    fn render(&mut self, frame: &Frame, size: TargetSize) {
        (**self).render(frame, size);
    }
}
