//! Windows backend, delegating to `framegrab-platform-windows`.
//!
//! The platform crate compiles everywhere (non-Windows builds get stubs that
//! report `Unsupported`), so this type does too; only [`super::native_backend`]
//! restricts it to Windows.

use std::time::Duration;

use framegrab_common::error::FramegrabResult;
use framegrab_platform_core::{
    CursorSnapshot, MonitorInfo, PixelBuffer, Rect, Size, WindowBounds, WindowHandle, WindowInfo,
};
use framegrab_platform_windows as platform_windows;

use crate::backend::{CaptureBackend, DuplicationStream};

pub struct WindowsBackend;

impl WindowsBackend {
    pub fn new() -> Self {
        platform_windows::enable_per_monitor_dpi_awareness();
        Self
    }
}

impl Default for WindowsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for WindowsBackend {
    fn name(&self) -> &str {
        "windows"
    }

    fn detect_monitors(&self) -> FramegrabResult<Vec<MonitorInfo>> {
        platform_windows::detect_monitors()
    }

    fn enumerate_windows(&self) -> FramegrabResult<Vec<WindowInfo>> {
        platform_windows::enumerate_windows()
    }

    fn window_bounds(&self, window: WindowHandle) -> FramegrabResult<WindowBounds> {
        platform_windows::window_bounds(window)
    }

    fn copy_screen(&self, region: Rect) -> FramegrabResult<PixelBuffer> {
        platform_windows::copy_screen(region)
    }

    fn print_window(&self, window: WindowHandle, size: Size) -> FramegrabResult<PixelBuffer> {
        platform_windows::print_window(window, size)
    }

    fn open_duplication(
        &self,
        monitor: &MonitorInfo,
    ) -> FramegrabResult<Box<dyn DuplicationStream>> {
        let duplication = platform_windows::MonitorDuplication::open(monitor)?;
        Ok(Box::new(duplication))
    }

    fn cursor_snapshot(&self) -> FramegrabResult<CursorSnapshot> {
        platform_windows::cursor_snapshot()
    }

    fn cursor_size_preference(&self) -> u32 {
        platform_windows::cursor_size_preference()
    }

    fn set_topmost(&self, window: WindowHandle, topmost: bool) -> FramegrabResult<()> {
        platform_windows::set_topmost(window, topmost)
    }
}

impl DuplicationStream for platform_windows::MonitorDuplication {
    fn acquire_latest(&mut self, timeout: Duration) -> FramegrabResult<Option<PixelBuffer>> {
        platform_windows::MonitorDuplication::acquire_latest(self, timeout)
    }
}
