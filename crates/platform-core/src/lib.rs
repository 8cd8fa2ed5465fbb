//! Framegrab platform core contracts.
//!
//! This crate contains cross-platform geometry, display, pixel, and cursor
//! data structures used by the capture engine and the OS backends without
//! coupling to a concrete platform API.

pub mod cursor;
pub mod pixels;

pub use cursor::{CursorImage, CursorSnapshot};
pub use pixels::{PixelBuffer, PixelBufferError, PixelFormat};

use serde::{Deserialize, Serialize};

/// A point in virtual-screen (or frame-local) pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Component-wise subtraction, saturating at the i32 range.
    pub fn offset_from(self, origin: Point) -> Point {
        Point {
            x: self.x.saturating_sub(origin.x),
            y: self.y.saturating_sub(origin.y),
        }
    }
}

/// A size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (e.g. a minimized window).
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle in virtual-screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from its edges; inverted edges yield an empty rect.
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            x: left,
            y: top,
            width: (right as i64 - left as i64).max(0) as u32,
            height: (bottom as i64 - top as i64).max(0) as u32,
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.size().is_empty()
    }

    pub fn contains(&self, point: Point) -> bool {
        let (px, py) = (point.x as i64, point.y as i64);
        px >= self.x as i64 && px < self.right() && py >= self.y as i64 && py < self.bottom()
    }

    /// Overlapping area of two rectangles, if any.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let left = (self.x as i64).max(other.x as i64);
        let top = (self.y as i64).max(other.y as i64);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if left >= right || top >= bottom {
            return None;
        }
        Some(Rect {
            x: left as i32,
            y: top as i32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

/// Opaque, stable identifier of a monitor (an `HMONITOR` on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorHandle(pub u64);

/// Opaque, stable identifier of a top-level window (an `HWND` on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub u64);

impl std::fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Information about a connected monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorInfo {
    /// Native handle.
    pub handle: MonitorHandle,
    /// Monitor name/identifier.
    pub name: String,
    /// Bounds in the virtual desktop (physical pixels).
    pub rect: Rect,
    /// Scale factor (for example 1.0, 1.25, 2.0).
    pub scale_factor: f64,
    /// Refresh rate in Hz.
    pub refresh_rate_hz: u32,
    /// Whether this monitor is primary.
    pub primary: bool,
}

/// A capturable top-level window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    /// Title shown to the user when picking a target.
    pub title: String,
    pub process_id: u32,
}

/// Everything that can currently be captured, as of one enumeration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureTargets {
    pub monitors: Vec<MonitorInfo>,
    pub windows: Vec<WindowInfo>,
}

impl CaptureTargets {
    pub fn primary_monitor(&self) -> Option<&MonitorInfo> {
        self.monitors
            .iter()
            .find(|m| m.primary)
            .or_else(|| self.monitors.first())
    }

    /// Windows whose title contains `needle` (case-insensitive).
    pub fn windows_matching<'a>(&'a self, needle: &str) -> impl Iterator<Item = &'a WindowInfo> {
        let needle = needle.to_lowercase();
        self.windows
            .iter()
            .filter(move |w| w.title.to_lowercase().contains(&needle))
    }
}

/// Geometry of a top-level window as reported by the window manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    /// Visible frame, excluding the drop shadow.
    pub frame: Rect,
    /// Client area in screen coordinates.
    pub client: Rect,
    pub minimized: bool,
}

impl WindowBounds {
    /// Offset of the client area inside the visible frame (title bar, borders).
    pub fn title_bar_offset(&self) -> Point {
        self.client.origin().offset_from(self.frame.origin())
    }
}

/// Compute virtual desktop bounds that include all connected monitors.
pub fn virtual_desktop_bounds(monitors: &[MonitorInfo]) -> Rect {
    if monitors.is_empty() {
        return Rect::new(0, 0, 1920, 1080);
    }

    let min_x = monitors.iter().map(|m| m.rect.x).min().unwrap_or(0);
    let min_y = monitors.iter().map(|m| m.rect.y).min().unwrap_or(0);
    let max_x = monitors.iter().map(|m| m.rect.right()).max().unwrap_or(1920);
    let max_y = monitors.iter().map(|m| m.rect.bottom()).max().unwrap_or(1080);

    Rect::from_edges(min_x, min_y, max_x as i32, max_y as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(name: &str, rect: Rect, primary: bool) -> MonitorInfo {
        MonitorInfo {
            handle: MonitorHandle(1),
            name: name.to_string(),
            rect,
            scale_factor: 1.0,
            refresh_rate_hz: 60,
            primary,
        }
    }

    #[test]
    fn virtual_bounds_cover_negative_origin_layout() {
        let monitors = vec![
            monitor("left", Rect::new(-1920, 0, 1920, 1080), false),
            monitor("main", Rect::new(0, 0, 2560, 1440), true),
        ];

        let bounds = virtual_desktop_bounds(&monitors);
        assert_eq!(bounds, Rect::new(-1920, 0, 4480, 1440));
    }

    #[test]
    fn rect_intersection() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, -20, 100, 50);
        assert_eq!(a.intersect(&b), Some(Rect::new(50, 0, 50, 30)));
        assert_eq!(a.intersect(&Rect::new(100, 0, 10, 10)), None);
    }

    #[test]
    fn rect_contains_is_half_open() {
        let r = Rect::new(10, 10, 5, 5);
        assert!(r.contains(Point::new(10, 10)));
        assert!(r.contains(Point::new(14, 14)));
        assert!(!r.contains(Point::new(15, 14)));
    }

    #[test]
    fn inverted_edges_are_empty() {
        assert!(Rect::from_edges(10, 10, 5, 20).is_empty());
    }

    #[test]
    fn title_bar_offset_is_client_minus_frame() {
        let bounds = WindowBounds {
            frame: Rect::new(100, 100, 800, 631),
            client: Rect::new(108, 131, 784, 592),
            minimized: false,
        };
        assert_eq!(bounds.title_bar_offset(), Point::new(8, 31));
    }

    #[test]
    fn primary_monitor_falls_back_to_first() {
        let targets = CaptureTargets {
            monitors: vec![monitor("a", Rect::new(0, 0, 10, 10), false)],
            windows: vec![],
        };
        assert_eq!(targets.primary_monitor().map(|m| m.name.as_str()), Some("a"));
    }

    proptest::proptest! {
        #[test]
        fn intersection_lies_inside_both(
            ax in -500i32..500, ay in -500i32..500, aw in 0u32..400, ah in 0u32..400,
            bx in -500i32..500, by in -500i32..500, bw in 0u32..400, bh in 0u32..400,
        ) {
            let a = Rect::new(ax, ay, aw, ah);
            let b = Rect::new(bx, by, bw, bh);
            if let Some(i) = a.intersect(&b) {
                proptest::prop_assert!(!i.is_empty());
                proptest::prop_assert!(i.x >= a.x && i.x >= b.x);
                proptest::prop_assert!(i.right() <= a.right() && i.right() <= b.right());
                proptest::prop_assert!(i.bottom() <= a.bottom() && i.bottom() <= b.bottom());
            }
        }
    }

    #[test]
    fn window_title_search_is_case_insensitive() {
        let targets = CaptureTargets {
            monitors: vec![],
            windows: vec![
                WindowInfo {
                    handle: WindowHandle(1),
                    title: "Untitled - Notepad".to_string(),
                    process_id: 4,
                },
                WindowInfo {
                    handle: WindowHandle(2),
                    title: "Terminal".to_string(),
                    process_id: 5,
                },
            ],
        };
        let hits: Vec<_> = targets.windows_matching("notepad").collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].handle, WindowHandle(1));
    }
}
