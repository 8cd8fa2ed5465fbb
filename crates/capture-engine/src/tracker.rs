//! Capture targets and per-tick geometry resolution.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::{
    MonitorHandle, MonitorInfo, Point, Rect, Size, WindowHandle, WindowInfo,
};

use crate::backend::CaptureBackend;

/// What to capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureTarget {
    /// A whole monitor.
    Monitor { handle: MonitorHandle },
    /// The client area of a top-level window, following it as it moves.
    Window { handle: WindowHandle, title: String },
    /// A fixed rectangle in virtual-screen coordinates.
    Region { rect: Rect },
}

impl CaptureTarget {
    pub fn monitor(info: &MonitorInfo) -> Self {
        Self::Monitor {
            handle: info.handle,
        }
    }

    pub fn window(info: &WindowInfo) -> Self {
        Self::Window {
            handle: info.handle,
            title: info.title.clone(),
        }
    }

    pub fn region(rect: Rect) -> Self {
        Self::Region { rect }
    }
}

impl std::fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Monitor { handle } => write!(f, "monitor {:#x}", handle.0),
            Self::Window { handle, title } => write!(f, "window {handle} \"{title}\""),
            Self::Region { rect } => write!(
                f,
                "region {}x{} at ({}, {})",
                rect.width, rect.height, rect.x, rect.y
            ),
        }
    }
}

/// Where the target is on this tick, in virtual-screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetGeometry {
    pub origin: Point,
    pub size: Size,
}

impl TargetGeometry {
    pub fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.origin(), rect.size())
    }

    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(self.origin, self.size)
    }

    /// True when there is nothing to capture (minimized or collapsed window).
    pub fn is_degenerate(&self) -> bool {
        self.size.is_empty()
    }
}

/// Result of one tracker tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedGeometry {
    pub geometry: TargetGeometry,
    /// The new size, when it differs from the previous tick's.
    pub resized: Option<Size>,
}

/// Resolves the target's geometry every tick and detects size changes.
///
/// Zero-area ticks (a minimized window) neither report a resize nor replace
/// the remembered size, so restoring a window to its old size is silent.
pub struct TargetTracker {
    target: CaptureTarget,
    backend: Arc<dyn CaptureBackend>,
    monitor: Option<MonitorInfo>,
    last_size: Option<Size>,
}

impl std::fmt::Debug for TargetTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetTracker")
            .field("target", &self.target)
            .field("backend", &self.backend.name())
            .field("last_size", &self.last_size)
            .finish()
    }
}

impl TargetTracker {
    /// Bind to `target`, failing if it does not exist right now.
    pub fn new(target: CaptureTarget, backend: Arc<dyn CaptureBackend>) -> FramegrabResult<Self> {
        let monitor = match &target {
            CaptureTarget::Monitor { handle } => {
                let monitor = backend
                    .detect_monitors()?
                    .into_iter()
                    .find(|m| m.handle == *handle)
                    .ok_or_else(|| {
                        FramegrabError::target_gone(format!(
                            "monitor {:#x} is not connected",
                            handle.0
                        ))
                    })?;
                Some(monitor)
            }
            CaptureTarget::Window { handle, .. } => {
                backend.window_bounds(*handle)?;
                None
            }
            CaptureTarget::Region { rect } => {
                if rect.is_empty() {
                    return Err(FramegrabError::config(format!(
                        "capture region must have a non-zero area (got {}x{})",
                        rect.width, rect.height
                    )));
                }
                None
            }
        };

        Ok(Self {
            target,
            backend,
            monitor,
            last_size: None,
        })
    }

    pub fn target(&self) -> &CaptureTarget {
        &self.target
    }

    /// The resolved monitor, for monitor targets.
    pub fn monitor(&self) -> Option<&MonitorInfo> {
        self.monitor.as_ref()
    }

    /// The last non-zero size observed by [`resolve`](Self::resolve).
    pub fn last_size(&self) -> Option<Size> {
        self.last_size
    }

    /// Query the target's geometry without updating resize tracking.
    pub fn current_geometry(&self) -> FramegrabResult<TargetGeometry> {
        match &self.target {
            CaptureTarget::Monitor { .. } => {
                let rect = self.monitor.as_ref().map(|m| m.rect).unwrap_or_default();
                Ok(TargetGeometry::from_rect(rect))
            }
            CaptureTarget::Window { handle, .. } => {
                let bounds = self.backend.window_bounds(*handle)?;
                if bounds.minimized {
                    return Ok(TargetGeometry::new(bounds.client.origin(), Size::default()));
                }
                Ok(TargetGeometry::from_rect(bounds.client))
            }
            CaptureTarget::Region { rect } => Ok(TargetGeometry::from_rect(*rect)),
        }
    }

    /// Resolve this tick's geometry.
    ///
    /// Errors from the backend propagate unchanged; a vanished window surfaces
    /// as `FramegrabError::TargetGone`.
    pub fn resolve(&mut self) -> FramegrabResult<TrackedGeometry> {
        let geometry = self.current_geometry()?;
        if geometry.is_degenerate() {
            return Ok(TrackedGeometry {
                geometry,
                resized: None,
            });
        }

        let resized = match self.last_size.replace(geometry.size) {
            Some(previous) if previous != geometry.size => {
                tracing::debug!(
                    target_desc = %self.target,
                    from = %previous,
                    to = %geometry.size,
                    "Capture target resized"
                );
                Some(geometry.size)
            }
            _ => None,
        };

        Ok(TrackedGeometry { geometry, resized })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SyntheticBackend;

    fn tracker_for(backend: &SyntheticBackend, target: CaptureTarget) -> TargetTracker {
        TargetTracker::new(target, Arc::new(backend.clone())).unwrap()
    }

    #[test]
    fn monitor_geometry_is_the_monitor_rect() {
        let backend = SyntheticBackend::new();
        let monitor = backend.detect_monitors().unwrap().remove(0);
        let mut tracker = tracker_for(&backend, CaptureTarget::monitor(&monitor));

        let tracked = tracker.resolve().unwrap();
        assert_eq!(tracked.geometry.rect(), monitor.rect);
        assert_eq!(tracked.resized, None);
        assert!(tracker.monitor().is_some());
    }

    #[test]
    fn unknown_monitor_is_target_gone() {
        let backend = SyntheticBackend::new();
        let target = CaptureTarget::Monitor {
            handle: MonitorHandle(99),
        };
        let err = TargetTracker::new(target, Arc::new(backend)).unwrap_err();
        assert!(err.is_target_gone());
    }

    #[test]
    fn empty_region_is_rejected() {
        let backend = SyntheticBackend::new();
        let target = CaptureTarget::region(Rect::new(0, 0, 0, 10));
        let err = TargetTracker::new(target, Arc::new(backend)).unwrap_err();
        assert!(matches!(err, FramegrabError::Config { .. }));
    }

    #[test]
    fn window_follows_client_area() {
        let backend = SyntheticBackend::new();
        let handle = backend.add_window("Editor", Rect::new(10, 10, 100, 80));
        let mut tracker = tracker_for(
            &backend,
            CaptureTarget::Window {
                handle,
                title: "Editor".into(),
            },
        );

        assert_eq!(
            tracker.resolve().unwrap().geometry.rect(),
            Rect::new(10, 10, 100, 80)
        );

        backend.move_window(handle, Rect::new(50, 60, 100, 80));
        let tracked = tracker.resolve().unwrap();
        assert_eq!(tracked.geometry.origin, Point::new(50, 60));
        assert_eq!(tracked.resized, None, "moves are not resizes");
    }

    #[test]
    fn resize_is_reported_once_per_transition() {
        let backend = SyntheticBackend::new();
        let handle = backend.add_window("Editor", Rect::new(0, 0, 100, 80));
        let mut tracker = tracker_for(
            &backend,
            CaptureTarget::Window {
                handle,
                title: "Editor".into(),
            },
        );
        tracker.resolve().unwrap();

        backend.move_window(handle, Rect::new(0, 0, 120, 90));
        assert_eq!(tracker.resolve().unwrap().resized, Some(Size::new(120, 90)));
        assert_eq!(tracker.resolve().unwrap().resized, None);
    }

    #[test]
    fn minimize_and_restore_is_silent() {
        let backend = SyntheticBackend::new();
        let handle = backend.add_window("Editor", Rect::new(0, 0, 100, 80));
        let mut tracker = tracker_for(
            &backend,
            CaptureTarget::Window {
                handle,
                title: "Editor".into(),
            },
        );
        tracker.resolve().unwrap();

        backend.minimize_window(handle, true);
        let tracked = tracker.resolve().unwrap();
        assert!(tracked.geometry.is_degenerate());
        assert_eq!(tracked.resized, None);
        assert_eq!(tracker.last_size(), Some(Size::new(100, 80)));

        backend.minimize_window(handle, false);
        assert_eq!(tracker.resolve().unwrap().resized, None);
    }

    #[test]
    fn closed_window_propagates_target_gone() {
        let backend = SyntheticBackend::new();
        let handle = backend.add_window("Editor", Rect::new(0, 0, 100, 80));
        let mut tracker = tracker_for(
            &backend,
            CaptureTarget::Window {
                handle,
                title: "Editor".into(),
            },
        );

        backend.close_window(handle);
        assert!(tracker.resolve().unwrap_err().is_target_gone());
    }

    #[test]
    fn target_serializes_with_kind_tag() {
        let json = serde_json::to_value(CaptureTarget::region(Rect::new(1, 2, 3, 4))).unwrap();
        assert_eq!(json["kind"], "region");
        assert_eq!(json["rect"]["width"], 3);
    }
}
