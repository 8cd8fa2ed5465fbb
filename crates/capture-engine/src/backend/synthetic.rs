//! In-memory desktop for testing and for running the engine off-Windows.
//!
//! The synthetic desktop renders a deterministic pattern (see
//! [`synthetic_pixel`]) so captured content can be checked against the
//! coordinates it was taken from. Windows can be moved, resized, minimized
//! and closed while an engine is running, and failures can be injected.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::{
    CursorSnapshot, MonitorHandle, MonitorInfo, PixelBuffer, Rect, Size, WindowBounds,
    WindowHandle, WindowInfo,
};

use crate::backend::{CaptureBackend, DuplicationStream};

const BORDER: i32 = 8;
const TITLE_BAR: i32 = 31;
const SYNTHETIC_PROCESS_ID: u32 = 4242;

/// BGRA value of the synthetic desktop at virtual-screen `(x, y)`.
pub fn synthetic_pixel(x: i32, y: i32) -> [u8; 4] {
    [x as u8, y as u8, (x ^ y) as u8, 255]
}

fn render(rect: Rect) -> PixelBuffer {
    let mut buffer = PixelBuffer::transparent(rect.width, rect.height);
    let stride = buffer.stride();
    for (row, line) in buffer.data_mut().chunks_exact_mut(stride).enumerate() {
        let y = rect.y.saturating_add(row as i32);
        for (col, px) in line.chunks_exact_mut(4).enumerate() {
            px.copy_from_slice(&synthetic_pixel(rect.x.saturating_add(col as i32), y));
        }
    }
    buffer
}

#[derive(Debug)]
struct SyntheticWindow {
    info: WindowInfo,
    client: Rect,
    minimized: bool,
}

impl SyntheticWindow {
    fn bounds(&self) -> WindowBounds {
        let client = if self.minimized {
            Rect::new(self.client.x, self.client.y, 0, 0)
        } else {
            self.client
        };
        WindowBounds {
            frame: Rect::new(
                self.client.x - BORDER,
                self.client.y - TITLE_BAR,
                self.client.width + 2 * BORDER as u32,
                self.client.height + (TITLE_BAR + BORDER) as u32,
            ),
            client,
            minimized: self.minimized,
        }
    }
}

#[derive(Debug)]
struct Desktop {
    monitors: Vec<MonitorInfo>,
    windows: Vec<SyntheticWindow>,
    next_window: u64,
    cursor: CursorSnapshot,
    cursor_fails: bool,
    cursor_size: u32,
    duplication_supported: bool,
    duplication_frame_limit: Option<u64>,
    failing_copies: u32,
    capture_delay: Duration,
    copy_calls: u64,
    topmost: Vec<WindowHandle>,
}

impl Desktop {
    fn window(&self, handle: WindowHandle) -> FramegrabResult<&SyntheticWindow> {
        self.windows
            .iter()
            .find(|w| w.info.handle == handle)
            .ok_or_else(|| FramegrabError::target_gone(format!("window {handle} no longer exists")))
    }

    fn window_mut(&mut self, handle: WindowHandle) -> Option<&mut SyntheticWindow> {
        self.windows.iter_mut().find(|w| w.info.handle == handle)
    }
}

/// A scriptable, in-memory [`CaptureBackend`].
///
/// Clones share the same desktop, so a test can keep one handle for scripting
/// while the engine owns another.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    desktop: Arc<Mutex<Desktop>>,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticBackend {
    /// A desktop with a single 640x480 primary monitor at the origin.
    pub fn new() -> Self {
        Self::with_monitors(vec![MonitorInfo {
            handle: MonitorHandle(1),
            name: "SYNTH-1".to_string(),
            rect: Rect::new(0, 0, 640, 480),
            scale_factor: 1.0,
            refresh_rate_hz: 60,
            primary: true,
        }])
    }

    pub fn with_monitors(monitors: Vec<MonitorInfo>) -> Self {
        Self {
            desktop: Arc::new(Mutex::new(Desktop {
                monitors,
                windows: Vec::new(),
                next_window: 0x1000,
                cursor: CursorSnapshot::hidden(),
                cursor_fails: false,
                cursor_size: 32,
                duplication_supported: true,
                duplication_frame_limit: None,
                failing_copies: 0,
                capture_delay: Duration::ZERO,
                copy_calls: 0,
                topmost: Vec::new(),
            })),
        }
    }

    fn desktop(&self) -> MutexGuard<'_, Desktop> {
        self.desktop.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a window whose client area covers `client`.
    pub fn add_window(&self, title: impl Into<String>, client: Rect) -> WindowHandle {
        let mut desktop = self.desktop();
        let handle = WindowHandle(desktop.next_window);
        desktop.next_window += 1;
        desktop.windows.push(SyntheticWindow {
            info: WindowInfo {
                handle,
                title: title.into(),
                process_id: SYNTHETIC_PROCESS_ID,
            },
            client,
            minimized: false,
        });
        handle
    }

    /// Move or resize a window's client area. Returns `false` if it is gone.
    pub fn move_window(&self, handle: WindowHandle, client: Rect) -> bool {
        match self.desktop().window_mut(handle) {
            Some(window) => {
                window.client = client;
                true
            }
            None => false,
        }
    }

    pub fn minimize_window(&self, handle: WindowHandle, minimized: bool) -> bool {
        match self.desktop().window_mut(handle) {
            Some(window) => {
                window.minimized = minimized;
                true
            }
            None => false,
        }
    }

    /// Destroy a window. Returns `false` if it was already gone.
    pub fn close_window(&self, handle: WindowHandle) -> bool {
        let mut desktop = self.desktop();
        let before = desktop.windows.len();
        desktop.windows.retain(|w| w.info.handle != handle);
        desktop.topmost.retain(|w| *w != handle);
        desktop.windows.len() != before
    }

    pub fn set_cursor(&self, cursor: CursorSnapshot) {
        self.desktop().cursor = cursor;
    }

    /// Make every cursor sample fail until reset.
    pub fn fail_cursor(&self, fail: bool) {
        self.desktop().cursor_fails = fail;
    }

    pub fn set_cursor_size(&self, size: u32) {
        self.desktop().cursor_size = size;
    }

    pub fn set_duplication_supported(&self, supported: bool) {
        self.desktop().duplication_supported = supported;
    }

    /// Stop delivering duplication frames after `limit` per stream.
    /// `None` delivers a new frame on every request.
    pub fn set_duplication_frame_limit(&self, limit: Option<u64>) {
        self.desktop().duplication_frame_limit = limit;
    }

    /// Make the next `count` screen copies fail with a capture error.
    pub fn fail_next_copies(&self, count: u32) {
        self.desktop().failing_copies = count;
    }

    /// Stall every screen copy and window print by `delay`.
    pub fn set_capture_delay(&self, delay: Duration) {
        self.desktop().capture_delay = delay;
    }

    /// Screen copies attempted so far, including failed ones.
    pub fn copy_calls(&self) -> u64 {
        self.desktop().copy_calls
    }

    pub fn is_topmost(&self, handle: WindowHandle) -> bool {
        self.desktop().topmost.contains(&handle)
    }

    fn stall(&self) {
        let delay = self.desktop().capture_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn detect_monitors(&self) -> FramegrabResult<Vec<MonitorInfo>> {
        Ok(self.desktop().monitors.clone())
    }

    fn enumerate_windows(&self) -> FramegrabResult<Vec<WindowInfo>> {
        Ok(self
            .desktop()
            .windows
            .iter()
            .map(|w| w.info.clone())
            .collect())
    }

    fn window_bounds(&self, window: WindowHandle) -> FramegrabResult<WindowBounds> {
        Ok(self.desktop().window(window)?.bounds())
    }

    fn copy_screen(&self, region: Rect) -> FramegrabResult<PixelBuffer> {
        {
            let mut desktop = self.desktop();
            desktop.copy_calls += 1;
            if desktop.failing_copies > 0 {
                desktop.failing_copies -= 1;
                return Err(FramegrabError::capture(format!(
                    "synthetic copy of {region:?} failed"
                )));
            }
        }
        self.stall();
        Ok(render(region))
    }

    fn print_window(&self, window: WindowHandle, size: Size) -> FramegrabResult<PixelBuffer> {
        let origin = self.desktop().window(window)?.client.origin();
        self.stall();
        Ok(render(Rect::from_origin_size(origin, size)))
    }

    fn open_duplication(
        &self,
        monitor: &MonitorInfo,
    ) -> FramegrabResult<Box<dyn DuplicationStream>> {
        let desktop = self.desktop();
        if !desktop.duplication_supported {
            return Err(FramegrabError::unsupported(
                "synthetic desktop has GPU duplication disabled",
            ));
        }
        if !desktop.monitors.iter().any(|m| m.handle == monitor.handle) {
            return Err(FramegrabError::target_gone(format!(
                "monitor {} is not connected",
                monitor.name
            )));
        }
        Ok(Box::new(SyntheticDuplication {
            desktop: Arc::clone(&self.desktop),
            rect: monitor.rect,
            delivered: 0,
        }))
    }

    fn cursor_snapshot(&self) -> FramegrabResult<CursorSnapshot> {
        let desktop = self.desktop();
        if desktop.cursor_fails {
            return Err(FramegrabError::platform("synthetic cursor sample failed"));
        }
        Ok(desktop.cursor.clone())
    }

    fn cursor_size_preference(&self) -> u32 {
        self.desktop().cursor_size
    }

    fn set_topmost(&self, window: WindowHandle, topmost: bool) -> FramegrabResult<()> {
        let mut desktop = self.desktop();
        desktop.window(window)?;
        desktop.topmost.retain(|w| *w != window);
        if topmost {
            desktop.topmost.push(window);
        }
        Ok(())
    }
}

struct SyntheticDuplication {
    desktop: Arc<Mutex<Desktop>>,
    rect: Rect,
    delivered: u64,
}

impl DuplicationStream for SyntheticDuplication {
    fn acquire_latest(&mut self, _timeout: Duration) -> FramegrabResult<Option<PixelBuffer>> {
        let limit = self
            .desktop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .duplication_frame_limit;
        if limit.is_some_and(|limit| self.delivered >= limit) {
            return Ok(None);
        }
        self.delivered += 1;
        Ok(Some(render(self.rect)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_follow_the_pattern() {
        let backend = SyntheticBackend::new();
        let buffer = backend.copy_screen(Rect::new(10, 20, 4, 3)).unwrap();

        assert_eq!(buffer.size(), Size::new(4, 3));
        assert_eq!(buffer.pixel(0, 0), Some(synthetic_pixel(10, 20)));
        assert_eq!(buffer.pixel(3, 2), Some(synthetic_pixel(13, 22)));
    }

    #[test]
    fn closed_window_is_target_gone() {
        let backend = SyntheticBackend::new();
        let handle = backend.add_window("Editor", Rect::new(50, 50, 200, 100));
        assert!(backend.window_bounds(handle).is_ok());

        assert!(backend.close_window(handle));
        let err = backend.window_bounds(handle).unwrap_err();
        assert!(err.is_target_gone());
        assert!(!backend.close_window(handle));
    }

    #[test]
    fn window_frame_surrounds_client() {
        let backend = SyntheticBackend::new();
        let handle = backend.add_window("Editor", Rect::new(108, 131, 784, 592));
        let bounds = backend.window_bounds(handle).unwrap();

        assert_eq!(bounds.frame, Rect::new(100, 100, 800, 631));
        assert_eq!(bounds.title_bar_offset().x, 8);
        assert_eq!(bounds.title_bar_offset().y, 31);
    }

    #[test]
    fn minimized_window_has_empty_client() {
        let backend = SyntheticBackend::new();
        let handle = backend.add_window("Editor", Rect::new(0, 0, 100, 100));
        backend.minimize_window(handle, true);

        let bounds = backend.window_bounds(handle).unwrap();
        assert!(bounds.minimized);
        assert!(bounds.client.is_empty());
    }

    #[test]
    fn injected_copy_failures_are_consumed() {
        let backend = SyntheticBackend::new();
        backend.fail_next_copies(1);

        assert!(backend.copy_screen(Rect::new(0, 0, 1, 1)).is_err());
        assert!(backend.copy_screen(Rect::new(0, 0, 1, 1)).is_ok());
        assert_eq!(backend.copy_calls(), 2);
    }

    #[test]
    fn duplication_respects_frame_limit() {
        let backend = SyntheticBackend::new();
        backend.set_duplication_frame_limit(Some(1));
        let monitor = backend.detect_monitors().unwrap().remove(0);
        let mut stream = backend.open_duplication(&monitor).unwrap();

        let timeout = Duration::from_millis(1);
        assert!(stream.acquire_latest(timeout).unwrap().is_some());
        assert!(stream.acquire_latest(timeout).unwrap().is_none());
    }

    #[test]
    fn duplication_can_be_disabled() {
        let backend = SyntheticBackend::new();
        backend.set_duplication_supported(false);
        let monitor = backend.detect_monitors().unwrap().remove(0);

        let err = backend.open_duplication(&monitor).err().unwrap();
        assert!(matches!(err, FramegrabError::Unsupported { .. }));
    }
}
