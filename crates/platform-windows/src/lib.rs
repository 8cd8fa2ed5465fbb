//! Framegrab Windows Platform Integration
//!
//! Win32 and WinRT bindings used by the capture engine:
//! - **Displays:** monitor enumeration, DPI scale, refresh rate
//! - **Windows:** top-level window enumeration, frame/client bounds, z-order
//! - **GDI:** screen blits and `PrintWindow` rendering into owned BGRA buffers
//! - **Cursor:** current cursor shape, position, and the user's preferred size
//! - **Windows.Graphics.Capture:** per-monitor GPU frame duplication
//!
//! On other targets every entry point is compiled as a stub that reports
//! `Unsupported`, so dependents build and test everywhere.

pub mod convert;

/// Whether Windows Graphics Capture can be used on this machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphicsCaptureSupport {
    pub available: bool,
    /// Borderless capture (Windows 11) is available.
    pub border_optional: bool,
}

#[cfg(target_os = "windows")]
mod cursor;
#[cfg(target_os = "windows")]
mod display;
#[cfg(target_os = "windows")]
mod gdi;
#[cfg(target_os = "windows")]
mod wgc;
#[cfg(target_os = "windows")]
mod window;

#[cfg(target_os = "windows")]
pub use cursor::{cursor_size_preference, cursor_snapshot};
#[cfg(target_os = "windows")]
pub use display::{detect_monitors, enable_per_monitor_dpi_awareness};
#[cfg(target_os = "windows")]
pub use gdi::{copy_screen, print_window};
#[cfg(target_os = "windows")]
pub use wgc::{probe_graphics_capture_support, MonitorDuplication};
#[cfg(target_os = "windows")]
pub use window::{enumerate_windows, set_topmost, window_bounds};

#[cfg(not(target_os = "windows"))]
mod stub;
#[cfg(not(target_os = "windows"))]
pub use stub::*;

/// Title of the overlay a front end shows while the user drags out a region.
/// It is never offered as a capture target.
pub const REGION_PICKER_TITLE: &str = "Framegrab - Select Region";

/// Cursor size used when the user has not configured one.
pub const DEFAULT_CURSOR_SIZE: u32 = 32;
