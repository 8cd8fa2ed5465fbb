//! Public facade: configure a target, start and stop runs, poll frames.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framegrab_common::clock::FramePacer;
use framegrab_common::config::CaptureDefaults;
use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::CaptureTargets;

use crate::backend::{self, CaptureBackend};
use crate::cursor::CursorCompositor;
use crate::engine::{CaptureEngine, EngineEvents, EngineParts, EngineStats, StopHandle};
use crate::frame::Frame;
use crate::queue::{FrameQueue, DEFAULT_QUEUE_CAPACITY};
use crate::source::CaptureSource;
use crate::strategy::{CaptureStrategy, StrategyKind, StrategyOptions};
use crate::tracker::{CaptureTarget, TargetTracker};

/// Settings for the next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Target frame rate (frames per second, > 0).
    pub frame_rate: f64,

    /// What to capture.
    pub target: CaptureTarget,

    /// Composite the mouse cursor into frames.
    pub show_cursor: bool,

    /// Requested capture mechanism.
    pub strategy: StrategyKind,

    /// Frames held before the oldest is dropped.
    pub queue_capacity: usize,

    /// How long GPU duplication waits for a new frame each tick.
    #[serde(with = "duration_ms")]
    pub gpu_frame_timeout: Duration,

    /// Pin a captured window above others while capturing.
    pub bring_window_to_front: bool,
}

impl EngineConfig {
    /// Capture `target` at `frame_rate` with every other setting at its default.
    pub fn new(frame_rate: f64, target: CaptureTarget) -> Self {
        Self {
            frame_rate,
            target,
            show_cursor: true,
            strategy: StrategyKind::Auto,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            gpu_frame_timeout: Duration::from_millis(100),
            bring_window_to_front: false,
        }
    }

    /// Build a config for `target` from the persisted capture defaults.
    pub fn from_defaults(defaults: &CaptureDefaults, target: CaptureTarget) -> FramegrabResult<Self> {
        Ok(Self {
            frame_rate: defaults.frame_rate,
            target,
            show_cursor: defaults.show_cursor,
            strategy: defaults.strategy.parse()?,
            queue_capacity: defaults.queue_capacity,
            gpu_frame_timeout: Duration::from_millis(defaults.gpu_frame_timeout_ms),
            bring_window_to_front: defaults.bring_window_to_front,
        })
    }

    pub fn with_cursor(mut self, show_cursor: bool) -> Self {
        self.show_cursor = show_cursor;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Reject settings no run could honour.
    pub fn validate(&self) -> FramegrabResult<()> {
        FramePacer::new(self.frame_rate)?;
        if self.queue_capacity == 0 {
            return Err(FramegrabError::config("queue capacity must be at least 1"));
        }
        if let CaptureTarget::Region { rect } = &self.target {
            if rect.is_empty() {
                return Err(FramegrabError::config(format!(
                    "capture region must have a non-zero area (got {}x{})",
                    rect.width, rect.height
                )));
            }
        }
        Ok(())
    }

    fn strategy_options(&self) -> StrategyOptions {
        StrategyOptions {
            gpu_frame_timeout: self.gpu_frame_timeout,
            bring_window_to_front: self.bring_window_to_front,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Whether a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Stopped,
    Running,
}

/// Drives capture runs against one backend.
///
/// The controller is meant to be owned by a single thread. Frames can be
/// consumed from elsewhere through [`frame_queue`](Self::frame_queue), and a
/// run can be stopped from anywhere through a [`StopHandle`].
pub struct EngineController {
    backend: Arc<dyn CaptureBackend>,
    config: Option<EngineConfig>,
    events: EngineEvents,
    queue: Arc<FrameQueue>,
    engine: Option<CaptureEngine>,
    active_strategy: Option<StrategyKind>,
}

impl std::fmt::Debug for EngineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineController")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("state", &self.state())
            .field("active_strategy", &self.active_strategy)
            .finish()
    }
}

impl EngineController {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            config: None,
            events: EngineEvents::default(),
            queue: Arc::new(FrameQueue::default()),
            engine: None,
            active_strategy: None,
        }
    }

    /// A controller on the native backend for this platform.
    pub fn native() -> FramegrabResult<Self> {
        Ok(Self::new(backend::native_backend()?))
    }

    pub fn backend(&self) -> &Arc<dyn CaptureBackend> {
        &self.backend
    }

    /// Apply settings for the next run.
    ///
    /// A run in progress is stopped first; call [`start`](Self::start) again
    /// to resume with the new settings.
    pub fn configure(&mut self, config: EngineConfig) -> FramegrabResult<()> {
        config.validate()?;
        if self.state() == EngineState::Running {
            tracing::info!("Reconfiguring a running engine, stopping current run");
        }
        self.stop();

        self.queue.set_capacity(config.queue_capacity)?;
        tracing::debug!(
            target_desc = %config.target,
            frame_rate = config.frame_rate,
            strategy = %config.strategy,
            show_cursor = config.show_cursor,
            "Engine configured"
        );
        self.config = Some(config);
        Ok(())
    }

    pub fn config(&self) -> Option<&EngineConfig> {
        self.config.as_ref()
    }

    /// Handlers for the next run. They are invoked on the producer thread.
    pub fn set_events(&mut self, events: EngineEvents) {
        self.events = events;
    }

    /// Begin capturing with the current configuration.
    pub fn start(&mut self) -> FramegrabResult<()> {
        if self.state() == EngineState::Running {
            return Err(FramegrabError::config("engine already running"));
        }
        // Reap a run that ended on its own.
        self.stop();

        let config = self
            .config
            .clone()
            .ok_or_else(|| FramegrabError::config("engine must be configured before start"))?;
        let pacer = FramePacer::new(config.frame_rate)?;

        let tracker = TargetTracker::new(config.target.clone(), Arc::clone(&self.backend))?;
        let strategy = CaptureStrategy::build(
            config.strategy,
            &tracker,
            Arc::clone(&self.backend),
            &config.strategy_options(),
        )?;
        let kind = strategy.kind();
        let source: Box<dyn CaptureSource> = if config.show_cursor {
            Box::new(CursorCompositor::new(
                Box::new(strategy),
                Arc::clone(&self.backend),
            ))
        } else {
            Box::new(strategy)
        };

        self.queue.clear();
        let engine = CaptureEngine::spawn(EngineParts {
            source,
            tracker,
            queue: Arc::clone(&self.queue),
            pacer,
            events: self.events.clone(),
        })?;

        tracing::info!(
            target_desc = %config.target,
            strategy = %kind,
            frame_rate = config.frame_rate,
            "Capture started"
        );
        self.engine = Some(engine);
        self.active_strategy = Some(kind);
        Ok(())
    }

    /// Stop the current run and wait for the producer to exit. Idempotent.
    ///
    /// Frames already queued stay available to [`next_frame`](Self::next_frame).
    pub fn stop(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.stop();
            let stats = engine.stats();
            tracing::info!(
                frames = stats.frames_captured,
                dropped = stats.frames_dropped,
                drop_rate = stats.drop_rate(),
                "Capture stopped"
            );
        }
        self.active_strategy = None;
    }

    /// The oldest queued frame, or `None` right away when none is ready.
    pub fn next_frame(&self) -> Option<Frame> {
        self.queue.try_dequeue()
    }

    /// Shared handle on the frame queue for consumers on other threads.
    pub fn frame_queue(&self) -> Arc<FrameQueue> {
        Arc::clone(&self.queue)
    }

    pub fn state(&self) -> EngineState {
        match &self.engine {
            Some(engine) if engine.is_running() => EngineState::Running,
            _ => EngineState::Stopped,
        }
    }

    /// A handle that can stop the current run from another thread.
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.engine.as_ref().map(CaptureEngine::stop_handle)
    }

    /// Statistics for the current (or last unreaped) run.
    pub fn stats(&self) -> Option<EngineStats> {
        self.engine.as_ref().map(CaptureEngine::stats)
    }

    /// The strategy chosen for the current run.
    pub fn active_strategy(&self) -> Option<StrategyKind> {
        self.active_strategy
    }

    /// Monitors and windows available to capture.
    pub fn enumerate_targets(&self) -> FramegrabResult<CaptureTargets> {
        backend::enumerate_targets(self.backend.as_ref())
    }
}

impl Drop for EngineController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SyntheticBackend;
    use framegrab_platform_core::Rect;

    fn region() -> CaptureTarget {
        CaptureTarget::region(Rect::new(0, 0, 8, 8))
    }

    #[test]
    fn rejects_unusable_frame_rate() {
        let mut controller = EngineController::new(Arc::new(SyntheticBackend::new()));
        for rate in [0.0, -5.0, f64::NAN, 1e-20] {
            let err = controller.configure(EngineConfig::new(rate, region())).unwrap_err();
            assert!(matches!(err, FramegrabError::Config { .. }));
        }
        assert!(controller.config().is_none());
    }

    #[test]
    fn start_requires_configuration() {
        let mut controller = EngineController::new(Arc::new(SyntheticBackend::new()));
        assert!(matches!(
            controller.start().unwrap_err(),
            FramegrabError::Config { .. }
        ));
        assert_eq!(controller.state(), EngineState::Stopped);
    }

    #[test]
    fn double_start_is_rejected() {
        let mut controller = EngineController::new(Arc::new(SyntheticBackend::new()));
        controller.configure(EngineConfig::new(30.0, region())).unwrap();
        controller.start().unwrap();

        assert!(controller.start().is_err());
        controller.stop();
        assert_eq!(controller.state(), EngineState::Stopped);
    }

    #[test]
    fn configure_while_running_stops_the_run() {
        let mut controller = EngineController::new(Arc::new(SyntheticBackend::new()));
        controller.configure(EngineConfig::new(30.0, region())).unwrap();
        controller.start().unwrap();

        controller
            .configure(EngineConfig::new(10.0, region()).with_queue_capacity(1))
            .unwrap();
        assert_eq!(controller.state(), EngineState::Stopped);
        assert_eq!(controller.frame_queue().capacity(), 1);
    }

    #[test]
    fn from_defaults_parses_strategy() {
        let defaults = CaptureDefaults {
            strategy: "window-print".into(),
            ..CaptureDefaults::default()
        };
        let config = EngineConfig::from_defaults(&defaults, region()).unwrap();
        assert_eq!(config.strategy, StrategyKind::WindowPrint);
        assert_eq!(config.gpu_frame_timeout, Duration::from_millis(100));

        let bad = CaptureDefaults {
            strategy: "magic".into(),
            ..CaptureDefaults::default()
        };
        assert!(EngineConfig::from_defaults(&bad, region()).is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = EngineConfig::new(24.0, region()).with_strategy(StrategyKind::PixelCopy);
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
