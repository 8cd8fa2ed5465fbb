//! Copy pixels straight off the composited screen.
//!
//! Works for any target, but a window is only captured as far as it is
//! visible: whatever overlaps it on screen ends up in the frame.

use std::sync::Arc;

use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::WindowHandle;

use super::{StrategyOptions, TopmostGuard};
use crate::backend::CaptureBackend;
use crate::frame::Frame;
use crate::tracker::TargetGeometry;

pub struct PixelCopyStrategy {
    backend: Arc<dyn CaptureBackend>,
    _topmost: Option<TopmostGuard>,
}

impl std::fmt::Debug for PixelCopyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelCopyStrategy")
            .field("backend", &self.backend.name())
            .field("topmost", &self._topmost)
            .finish()
    }
}

impl PixelCopyStrategy {
    /// `window` is set for window targets; it is pinned on top when
    /// `options.bring_window_to_front` asks for it.
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        window: Option<WindowHandle>,
        options: &StrategyOptions,
    ) -> Self {
        let topmost = match window {
            Some(window) if options.bring_window_to_front => {
                TopmostGuard::pin(Arc::clone(&backend), window)
            }
            _ => None,
        };
        Self {
            backend,
            _topmost: topmost,
        }
    }

    pub fn capture(&mut self, geometry: &TargetGeometry) -> FramegrabResult<Frame> {
        if geometry.is_degenerate() {
            return Ok(Frame::placeholder());
        }

        let buffer = self.backend.copy_screen(geometry.rect())?;
        if buffer.size() != geometry.size {
            return Err(FramegrabError::capture(format!(
                "screen copy returned {} for a {} target",
                buffer.size(),
                geometry.size
            )));
        }
        Ok(Frame::new(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::synthetic::{synthetic_pixel, SyntheticBackend};
    use framegrab_platform_core::{Point, Rect, Size};

    #[test]
    fn copies_the_target_rect() {
        let backend = SyntheticBackend::new();
        let mut strategy =
            PixelCopyStrategy::new(Arc::new(backend), None, &StrategyOptions::default());

        let frame = strategy
            .capture(&TargetGeometry::from_rect(Rect::new(30, 40, 8, 6)))
            .unwrap();
        assert_eq!(frame.size(), Size::new(8, 6));
        assert_eq!(frame.buffer().pixel(0, 0), Some(synthetic_pixel(30, 40)));
        assert_eq!(frame.buffer().pixel(7, 5), Some(synthetic_pixel(37, 45)));
    }

    #[test]
    fn degenerate_geometry_yields_placeholder() {
        let backend = SyntheticBackend::new();
        let mut strategy =
            PixelCopyStrategy::new(Arc::new(backend.clone()), None, &StrategyOptions::default());

        let frame = strategy
            .capture(&TargetGeometry::new(Point::new(5, 5), Size::new(0, 0)))
            .unwrap();
        assert!(frame.is_placeholder());
        assert_eq!(backend.copy_calls(), 0);
    }

    #[test]
    fn pins_window_only_when_asked() {
        let backend = SyntheticBackend::new();
        let handle = backend.add_window("Editor", Rect::new(0, 0, 10, 10));

        let plain = PixelCopyStrategy::new(
            Arc::new(backend.clone()),
            Some(handle),
            &StrategyOptions::default(),
        );
        assert!(!backend.is_topmost(handle));
        drop(plain);

        let options = StrategyOptions {
            bring_window_to_front: true,
            ..StrategyOptions::default()
        };
        let pinned = PixelCopyStrategy::new(Arc::new(backend.clone()), Some(handle), &options);
        assert!(backend.is_topmost(handle));
        drop(pinned);
        assert!(!backend.is_topmost(handle));
    }

    #[test]
    fn copy_failure_is_a_capture_error() {
        let backend = SyntheticBackend::new();
        backend.fail_next_copies(1);
        let mut strategy =
            PixelCopyStrategy::new(Arc::new(backend), None, &StrategyOptions::default());

        let err = strategy
            .capture(&TargetGeometry::from_rect(Rect::new(0, 0, 4, 4)))
            .unwrap_err();
        assert!(matches!(err, FramegrabError::Capture { .. }));
    }
}
