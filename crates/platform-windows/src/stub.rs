//! Non-Windows stand-ins so dependents build and test on every target.

use std::time::Duration;

use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::{
    CursorSnapshot, MonitorInfo, PixelBuffer, Rect, Size, WindowBounds, WindowHandle, WindowInfo,
};

use crate::{GraphicsCaptureSupport, DEFAULT_CURSOR_SIZE};

fn unsupported<T>(what: &str) -> FramegrabResult<T> {
    Err(FramegrabError::unsupported(format!(
        "{what} requires Windows"
    )))
}

pub fn enable_per_monitor_dpi_awareness() {}

pub fn detect_monitors() -> FramegrabResult<Vec<MonitorInfo>> {
    unsupported("monitor enumeration")
}

pub fn enumerate_windows() -> FramegrabResult<Vec<WindowInfo>> {
    unsupported("window enumeration")
}

pub fn window_bounds(_window: WindowHandle) -> FramegrabResult<WindowBounds> {
    unsupported("window geometry")
}

pub fn set_topmost(_window: WindowHandle, _topmost: bool) -> FramegrabResult<()> {
    unsupported("changing window z-order")
}

pub fn copy_screen(_region: Rect) -> FramegrabResult<PixelBuffer> {
    unsupported("screen copy")
}

pub fn print_window(_window: WindowHandle, _size: Size) -> FramegrabResult<PixelBuffer> {
    unsupported("window printing")
}

pub fn cursor_snapshot() -> FramegrabResult<CursorSnapshot> {
    unsupported("cursor sampling")
}

pub fn cursor_size_preference() -> u32 {
    DEFAULT_CURSOR_SIZE
}

pub fn probe_graphics_capture_support() -> GraphicsCaptureSupport {
    GraphicsCaptureSupport::default()
}

/// Never constructed off Windows.
pub struct MonitorDuplication {
    _private: (),
}

impl MonitorDuplication {
    pub fn open(_monitor: &MonitorInfo) -> FramegrabResult<Self> {
        unsupported("Windows Graphics Capture")
    }

    pub fn acquire_latest(&mut self, _timeout: Duration) -> FramegrabResult<Option<PixelBuffer>> {
        unsupported("Windows Graphics Capture")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_reports_unsupported() {
        assert!(matches!(
            detect_monitors(),
            Err(FramegrabError::Unsupported { .. })
        ));
        assert!(matches!(
            copy_screen(Rect::new(0, 0, 1, 1)),
            Err(FramegrabError::Unsupported { .. })
        ));
        assert!(!probe_graphics_capture_support().available);
        assert_eq!(cursor_size_preference(), DEFAULT_CURSOR_SIZE);
    }
}
