pub mod capture;
pub mod check;
pub mod config;
pub mod targets;

use std::sync::Arc;

use framegrab_capture_engine::{native_backend, CaptureBackend, SyntheticBackend};
use framegrab_platform_core::Rect;

/// The backend a command runs against.
pub fn backend(synthetic: bool) -> anyhow::Result<Arc<dyn CaptureBackend>> {
    if synthetic {
        return Ok(Arc::new(demo_desktop()));
    }
    Ok(native_backend()?)
}

/// A synthetic desktop with a couple of windows to pick from.
pub fn demo_desktop() -> SyntheticBackend {
    let desktop = SyntheticBackend::new();
    desktop.add_window("Untitled - Notepad", Rect::new(40, 60, 320, 200));
    desktop.add_window("Terminal", Rect::new(300, 220, 300, 180));
    desktop
}
