//! Platform backends.
//!
//! A backend is the engine's only window into the operating system: it
//! enumerates monitors and windows, reads window geometry, grabs pixels, and
//! samples the cursor. Strategies, the cursor compositor and the target
//! tracker are written against [`CaptureBackend`] so they run unchanged on
//! the native backend and on [`SyntheticBackend`].

use std::time::Duration;

use framegrab_common::error::FramegrabResult;
use framegrab_platform_core::{
    CaptureTargets, CursorSnapshot, MonitorInfo, PixelBuffer, Rect, Size, WindowBounds,
    WindowHandle, WindowInfo,
};

pub mod synthetic;
pub mod windows;

pub use synthetic::SyntheticBackend;
pub use windows::WindowsBackend;

/// Abstract interface for platform-specific capture capabilities.
pub trait CaptureBackend: Send + Sync {
    /// Short identifier for logs and `framegrab check`.
    fn name(&self) -> &str;

    /// Detect connected monitors.
    fn detect_monitors(&self) -> FramegrabResult<Vec<MonitorInfo>>;

    /// List top-level windows a user would reasonably pick as a target.
    fn enumerate_windows(&self) -> FramegrabResult<Vec<WindowInfo>>;

    /// Current geometry of `window`.
    ///
    /// Fails with `FramegrabError::TargetGone` once the window no longer exists.
    fn window_bounds(&self, window: WindowHandle) -> FramegrabResult<WindowBounds>;

    /// Copy what is on screen inside `region` (virtual-screen coordinates).
    fn copy_screen(&self, region: Rect) -> FramegrabResult<PixelBuffer>;

    /// Ask `window` to render its client area into a `size` buffer, even when
    /// it is partially covered.
    fn print_window(&self, window: WindowHandle, size: Size) -> FramegrabResult<PixelBuffer>;

    /// Open a GPU duplication stream for `monitor`.
    ///
    /// Fails with `FramegrabError::Unsupported` when the platform or GPU
    /// cannot duplicate that output.
    fn open_duplication(&self, monitor: &MonitorInfo)
        -> FramegrabResult<Box<dyn DuplicationStream>>;

    /// Sample cursor position, visibility and shape.
    fn cursor_snapshot(&self) -> FramegrabResult<CursorSnapshot>;

    /// The user's preferred cursor size in pixels.
    fn cursor_size_preference(&self) -> u32 {
        32
    }

    /// Pin `window` above other windows, or release it.
    fn set_topmost(&self, window: WindowHandle, topmost: bool) -> FramegrabResult<()> {
        let _ = (window, topmost);
        Ok(())
    }
}

/// A source of composited output frames for a single monitor.
pub trait DuplicationStream: Send {
    /// Wait up to `timeout` for the newest composited frame.
    ///
    /// Returns `Ok(None)` when nothing new arrived in time; callers decide
    /// whether to reuse their previous frame.
    fn acquire_latest(&mut self, timeout: Duration) -> FramegrabResult<Option<PixelBuffer>>;
}

/// Get the backend for the running platform.
pub fn native_backend() -> FramegrabResult<std::sync::Arc<dyn CaptureBackend>> {
    #[cfg(target_os = "windows")]
    {
        Ok(std::sync::Arc::new(WindowsBackend::new()))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(framegrab_common::error::FramegrabError::unsupported(format!(
            "no native capture backend for {}; use the synthetic backend",
            std::env::consts::OS
        )))
    }
}

/// Snapshot every monitor and capturable window.
pub fn enumerate_targets(backend: &dyn CaptureBackend) -> FramegrabResult<CaptureTargets> {
    let monitors = backend.detect_monitors()?;
    let windows = backend.enumerate_windows()?;
    tracing::debug!(
        backend = backend.name(),
        monitors = monitors.len(),
        windows = windows.len(),
        "Enumerated capture targets"
    );
    Ok(CaptureTargets { monitors, windows })
}
