//! Captured frames.

use std::time::Instant;

use framegrab_common::clock::CaptureClock;
use framegrab_platform_core::{PixelBuffer, PixelFormat, Size};

/// One captured image plus its run-relative timing.
///
/// A frame is exclusively owned: the producer hands it to the queue and the
/// consumer that dequeues it becomes responsible for it. Nothing retains a
/// reference after publication.
#[derive(Debug, Clone)]
pub struct Frame {
    sequence: u64,
    timestamp_ns: u64,
    captured_at: Instant,
    buffer: PixelBuffer,
    placeholder: bool,
}

impl Frame {
    /// Wrap a freshly captured buffer. Sequence and timestamp are assigned
    /// by the engine when the frame is published.
    pub fn new(buffer: PixelBuffer) -> Self {
        Self {
            sequence: 0,
            timestamp_ns: 0,
            captured_at: Instant::now(),
            buffer,
            placeholder: false,
        }
    }

    /// A 1x1 transparent frame, produced while the target has no visible area
    /// (for example a minimized window).
    pub fn placeholder() -> Self {
        Self {
            placeholder: true,
            ..Self::new(PixelBuffer::transparent(1, 1))
        }
    }

    pub(crate) fn stamp(&mut self, sequence: u64, clock: &CaptureClock) {
        self.sequence = sequence;
        self.timestamp_ns = clock.ns_at(self.captured_at);
    }

    /// Zero-based position of this frame within its run.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Nanoseconds between the start of the run and the capture.
    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn size(&self) -> Size {
        self.buffer.size()
    }

    pub fn format(&self) -> PixelFormat {
        self.buffer.format()
    }

    pub fn data(&self) -> &[u8] {
        self.buffer.data()
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut PixelBuffer {
        &mut self.buffer
    }

    pub fn into_buffer(self) -> PixelBuffer {
        self.buffer
    }

    /// True for frames standing in for a zero-area target.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn placeholder_is_one_transparent_pixel() {
        let frame = Frame::placeholder();
        assert!(frame.is_placeholder());
        assert_eq!(frame.size(), Size::new(1, 1));
        assert_eq!(frame.data(), &[0, 0, 0, 0]);
    }

    #[test]
    fn stamp_measures_from_clock_epoch() {
        let clock = CaptureClock::start();
        std::thread::sleep(Duration::from_millis(5));
        let mut frame = Frame::new(PixelBuffer::transparent(2, 2));
        frame.stamp(7, &clock);

        assert_eq!(frame.sequence(), 7);
        assert!(frame.timestamp_ns() >= 5_000_000);
        assert!(!frame.is_placeholder());
    }
}
