//! Read composited monitor output from the GPU.
//!
//! The compositor only produces a frame when something on screen changes, so
//! a tick that finds nothing new re-publishes the previous frame. Only the
//! very first frame of a run is mandatory.

use std::time::Duration;

use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::{MonitorInfo, PixelBuffer};

use super::StrategyOptions;
use crate::backend::{CaptureBackend, DuplicationStream};
use crate::frame::Frame;
use crate::tracker::TargetGeometry;

/// Minimum wait for the first frame; the compositor may take a moment to
/// start delivering after the session opens.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

pub struct GpuDuplicationStrategy {
    stream: Box<dyn DuplicationStream>,
    monitor: String,
    timeout: Duration,
    last: Option<PixelBuffer>,
    reused: u64,
}

impl std::fmt::Debug for GpuDuplicationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuDuplicationStrategy")
            .field("monitor", &self.monitor)
            .field("timeout", &self.timeout)
            .field("has_frame", &self.last.is_some())
            .field("reused", &self.reused)
            .finish()
    }
}

impl GpuDuplicationStrategy {
    pub fn open(
        backend: &dyn CaptureBackend,
        monitor: &MonitorInfo,
        options: &StrategyOptions,
    ) -> FramegrabResult<Self> {
        let stream = backend.open_duplication(monitor)?;
        tracing::debug!(monitor = %monitor.name, "GPU duplication session opened");
        Ok(Self {
            stream,
            monitor: monitor.name.clone(),
            timeout: options.gpu_frame_timeout,
            last: None,
            reused: 0,
        })
    }

    /// Ticks that re-published the previous frame.
    pub fn reused_frames(&self) -> u64 {
        self.reused
    }

    pub fn capture(&mut self, _geometry: &TargetGeometry) -> FramegrabResult<Frame> {
        let wait = match self.last {
            Some(_) => self.timeout,
            None => self.timeout.max(FIRST_FRAME_TIMEOUT),
        };

        match self.stream.acquire_latest(wait)? {
            Some(buffer) => {
                self.last = Some(buffer.clone());
                Ok(Frame::new(buffer))
            }
            None => match &self.last {
                Some(previous) => {
                    self.reused += 1;
                    Ok(Frame::new(previous.clone()))
                }
                None => Err(FramegrabError::capture(format!(
                    "no frame from {} within {:?}",
                    self.monitor, wait
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SyntheticBackend;
    use framegrab_platform_core::Size;

    fn open(backend: &SyntheticBackend) -> (GpuDuplicationStrategy, TargetGeometry) {
        let monitor = backend.detect_monitors().unwrap().remove(0);
        let options = StrategyOptions {
            gpu_frame_timeout: Duration::from_millis(1),
            ..StrategyOptions::default()
        };
        let strategy = GpuDuplicationStrategy::open(backend, &monitor, &options).unwrap();
        (strategy, TargetGeometry::from_rect(monitor.rect))
    }

    #[test]
    fn captures_whole_monitor() {
        let backend = SyntheticBackend::new();
        let (mut strategy, geometry) = open(&backend);

        let frame = strategy.capture(&geometry).unwrap();
        assert_eq!(frame.size(), Size::new(640, 480));
    }

    #[test]
    fn reuses_last_frame_when_idle() {
        let backend = SyntheticBackend::new();
        backend.set_duplication_frame_limit(Some(1));
        let (mut strategy, geometry) = open(&backend);

        let first = strategy.capture(&geometry).unwrap();
        let second = strategy.capture(&geometry).unwrap();
        assert_eq!(first.data(), second.data());
        assert_eq!(strategy.reused_frames(), 1);
    }

    #[test]
    fn missing_first_frame_is_a_capture_error() {
        let backend = SyntheticBackend::new();
        backend.set_duplication_frame_limit(Some(0));
        let (mut strategy, geometry) = open(&backend);

        let err = strategy.capture(&geometry).unwrap_err();
        assert!(matches!(err, FramegrabError::Capture { .. }));
    }
}
