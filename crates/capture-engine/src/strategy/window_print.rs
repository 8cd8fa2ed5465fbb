//! Ask the window to render its own client area.
//!
//! Unlike a screen copy this keeps working while other windows cover the
//! target, as long as the application honours the print request.

use std::sync::Arc;

use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::WindowHandle;

use super::{StrategyOptions, TopmostGuard};
use crate::backend::CaptureBackend;
use crate::frame::Frame;
use crate::tracker::TargetGeometry;

pub struct WindowPrintStrategy {
    window: WindowHandle,
    backend: Arc<dyn CaptureBackend>,
    _topmost: Option<TopmostGuard>,
}

impl std::fmt::Debug for WindowPrintStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowPrintStrategy")
            .field("window", &self.window)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl WindowPrintStrategy {
    pub fn new(
        window: WindowHandle,
        backend: Arc<dyn CaptureBackend>,
        options: &StrategyOptions,
    ) -> Self {
        let topmost = if options.bring_window_to_front {
            TopmostGuard::pin(Arc::clone(&backend), window)
        } else {
            None
        };
        Self {
            window,
            backend,
            _topmost: topmost,
        }
    }

    pub fn capture(&mut self, geometry: &TargetGeometry) -> FramegrabResult<Frame> {
        if geometry.is_degenerate() {
            return Ok(Frame::placeholder());
        }

        let buffer = self.backend.print_window(self.window, geometry.size)?;
        if buffer.size() != geometry.size {
            return Err(FramegrabError::capture(format!(
                "window {} printed {} into a {} frame",
                self.window,
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
    use framegrab_platform_core::{Rect, Size};

    #[test]
    fn prints_client_area_at_window_origin() {
        let backend = SyntheticBackend::new();
        let handle = backend.add_window("Editor", Rect::new(20, 30, 16, 12));
        let mut strategy =
            WindowPrintStrategy::new(handle, Arc::new(backend), &StrategyOptions::default());

        let frame = strategy
            .capture(&TargetGeometry::from_rect(Rect::new(20, 30, 16, 12)))
            .unwrap();
        assert_eq!(frame.size(), Size::new(16, 12));
        assert_eq!(frame.buffer().pixel(0, 0), Some(synthetic_pixel(20, 30)));
    }

    #[test]
    fn printing_a_closed_window_is_target_gone() {
        let backend = SyntheticBackend::new();
        let handle = backend.add_window("Editor", Rect::new(0, 0, 16, 12));
        let mut strategy = WindowPrintStrategy::new(
            handle,
            Arc::new(backend.clone()),
            &StrategyOptions::default(),
        );

        backend.close_window(handle);
        let err = strategy
            .capture(&TargetGeometry::from_rect(Rect::new(0, 0, 16, 12)))
            .unwrap_err();
        assert!(err.is_target_gone());
    }
}
