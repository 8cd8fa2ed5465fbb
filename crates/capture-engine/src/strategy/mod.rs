//! Capture strategies.
//!
//! A strategy is chosen once, when the engine starts, from the configured
//! [`StrategyKind`] and the target:
//!
//! | kind              | monitor              | window        | region     |
//! |-------------------|----------------------|---------------|------------|
//! | `auto`            | GPU, else pixel copy | pixel copy    | pixel copy |
//! | `pixel-copy`      | pixel copy           | pixel copy    | pixel copy |
//! | `window-print`    | unsupported          | window print  | unsupported|
//! | `gpu-duplication` | GPU                  | unsupported   | unsupported|

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::WindowHandle;

use crate::backend::CaptureBackend;
use crate::frame::Frame;
use crate::source::CaptureSource;
use crate::tracker::{CaptureTarget, TargetGeometry, TargetTracker};

pub mod gpu_duplication;
pub mod pixel_copy;
pub mod window_print;

pub use gpu_duplication::GpuDuplicationStrategy;
pub use pixel_copy::PixelCopyStrategy;
pub use window_print::WindowPrintStrategy;

/// Requested capture mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Pick the best mechanism for the target.
    #[default]
    Auto,
    /// Copy pixels from the composited screen.
    PixelCopy,
    /// Ask the window to render itself.
    WindowPrint,
    /// Read frames from the GPU compositor.
    GpuDuplication,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        Self::Auto,
        Self::PixelCopy,
        Self::WindowPrint,
        Self::GpuDuplication,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::PixelCopy => "pixel-copy",
            Self::WindowPrint => "window-print",
            Self::GpuDuplication => "gpu-duplication",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = FramegrabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                FramegrabError::config(format!(
                    "unknown capture strategy '{s}' (expected auto, pixel-copy, window-print or gpu-duplication)"
                ))
            })
    }
}

/// Tuning shared by all strategies.
#[derive(Debug, Clone)]
pub struct StrategyOptions {
    /// How long GPU duplication waits for a new composited frame.
    pub gpu_frame_timeout: Duration,
    /// Pin a captured window above others for the duration of the run.
    pub bring_window_to_front: bool,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self {
            gpu_frame_timeout: Duration::from_millis(100),
            bring_window_to_front: false,
        }
    }
}

/// The strategy chosen for a run.
#[derive(Debug)]
pub enum CaptureStrategy {
    PixelCopy(PixelCopyStrategy),
    WindowPrint(WindowPrintStrategy),
    GpuDuplication(GpuDuplicationStrategy),
}

impl CaptureStrategy {
    /// Choose and initialize the strategy for `tracker`'s target.
    pub fn build(
        kind: StrategyKind,
        tracker: &TargetTracker,
        backend: Arc<dyn CaptureBackend>,
        options: &StrategyOptions,
    ) -> FramegrabResult<Self> {
        let target = tracker.target();
        let strategy = match (kind, target) {
            (StrategyKind::Auto, CaptureTarget::Monitor { .. }) => {
                match Self::gpu(tracker, Arc::clone(&backend), options) {
                    Ok(gpu) => gpu,
                    Err(FramegrabError::Unsupported { message }) => {
                        tracing::info!(
                            reason = %message,
                            "GPU duplication unavailable, falling back to pixel copy"
                        );
                        Self::pixel_copy(target, backend, options)
                    }
                    Err(e) => return Err(e),
                }
            }
            (StrategyKind::Auto | StrategyKind::PixelCopy, _) => {
                Self::pixel_copy(target, backend, options)
            }
            (StrategyKind::WindowPrint, CaptureTarget::Window { handle, .. }) => {
                Self::WindowPrint(WindowPrintStrategy::new(*handle, backend, options))
            }
            (StrategyKind::WindowPrint, other) => {
                return Err(FramegrabError::unsupported(format!(
                    "window print can only capture windows, not {other}"
                )));
            }
            (StrategyKind::GpuDuplication, CaptureTarget::Monitor { .. }) => {
                Self::gpu(tracker, backend, options)?
            }
            (StrategyKind::GpuDuplication, other) => {
                return Err(FramegrabError::unsupported(format!(
                    "GPU duplication can only capture monitors, not {other}"
                )));
            }
        };

        tracing::info!(
            requested = %kind,
            strategy = strategy.name(),
            target_desc = %target,
            "Capture strategy selected"
        );
        Ok(strategy)
    }

    fn pixel_copy(
        target: &CaptureTarget,
        backend: Arc<dyn CaptureBackend>,
        options: &StrategyOptions,
    ) -> Self {
        let window = match target {
            CaptureTarget::Window { handle, .. } => Some(*handle),
            _ => None,
        };
        Self::PixelCopy(PixelCopyStrategy::new(backend, window, options))
    }

    fn gpu(
        tracker: &TargetTracker,
        backend: Arc<dyn CaptureBackend>,
        options: &StrategyOptions,
    ) -> FramegrabResult<Self> {
        let monitor = tracker
            .monitor()
            .ok_or_else(|| FramegrabError::unsupported("GPU duplication needs a monitor target"))?;
        let strategy = GpuDuplicationStrategy::open(backend.as_ref(), monitor, options)?;
        Ok(Self::GpuDuplication(strategy))
    }

    /// The concrete mechanism in use (never [`StrategyKind::Auto`]).
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::PixelCopy(_) => StrategyKind::PixelCopy,
            Self::WindowPrint(_) => StrategyKind::WindowPrint,
            Self::GpuDuplication(_) => StrategyKind::GpuDuplication,
        }
    }
}

impl CaptureSource for CaptureStrategy {
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    fn capture(&mut self, geometry: &TargetGeometry) -> FramegrabResult<Frame> {
        match self {
            Self::PixelCopy(s) => s.capture(geometry),
            Self::WindowPrint(s) => s.capture(geometry),
            Self::GpuDuplication(s) => s.capture(geometry),
        }
    }
}

/// Keeps a window above all others until dropped.
pub(crate) struct TopmostGuard {
    backend: Arc<dyn CaptureBackend>,
    window: WindowHandle,
}

impl TopmostGuard {
    /// Pin `window`, or return `None` (after logging) if the OS refused.
    pub(crate) fn pin(backend: Arc<dyn CaptureBackend>, window: WindowHandle) -> Option<Self> {
        match backend.set_topmost(window, true) {
            Ok(()) => Some(Self { backend, window }),
            Err(e) => {
                tracing::warn!(window = %window, error = %e, "Failed to keep window on top");
                None
            }
        }
    }
}

impl std::fmt::Debug for TopmostGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopmostGuard")
            .field("window", &self.window)
            .finish()
    }
}

impl Drop for TopmostGuard {
    fn drop(&mut self) {
        if let Err(e) = self.backend.set_topmost(self.window, false) {
            tracing::debug!(window = %self.window, error = %e, "Failed to release topmost window");
        }
    }
}
