//! The per-tick capture abstraction.

use framegrab_common::error::FramegrabResult;

use crate::frame::Frame;
use crate::tracker::TargetGeometry;

/// Anything that can produce one frame for the current target geometry.
///
/// Implemented by every capture strategy and by the cursor compositor, which
/// wraps another source. The producer thread is the only caller.
pub trait CaptureSource: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Capture one frame covering `geometry`.
    ///
    /// A zero-area geometry yields [`Frame::placeholder`] rather than an error.
    fn capture(&mut self, geometry: &TargetGeometry) -> FramegrabResult<Frame>;
}

impl<S: CaptureSource + ?Sized> CaptureSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn capture(&mut self, geometry: &TargetGeometry) -> FramegrabResult<Frame> {
        (**self).capture(geometry)
    }
}
