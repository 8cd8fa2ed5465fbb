//! The producer thread.
//!
//! One [`CaptureEngine`] owns one dedicated thread that loops at a fixed
//! interval: resolve the target, capture, stamp, publish, sleep. Stopping is
//! cooperative and honoured within one tick, or sooner when the thread is
//! sleeping. Any error ends the run and is reported exactly once through
//! [`EngineEvents`]; nothing escapes the thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use framegrab_common::clock::{CaptureClock, FramePacer};
use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::Size;

use crate::queue::FrameQueue;
use crate::source::CaptureSource;
use crate::tracker::TargetTracker;

const THREAD_NAME: &str = "framegrab-capture";

/// Why a run ended on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortKind {
    /// The captured window or monitor disappeared.
    TargetGone,
    /// The capture mechanism failed.
    CaptureFailed,
}

/// Payload of the aborted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortReason {
    pub kind: AbortKind,
    pub message: String,
}

impl AbortReason {
    pub fn from_error(error: &FramegrabError) -> Self {
        let kind = if error.is_target_gone() {
            AbortKind::TargetGone
        } else {
            AbortKind::CaptureFailed
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self {
            kind: AbortKind::CaptureFailed,
            message: format!("capture thread panicked: {detail}"),
        }
    }
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

type SizeChangedFn = dyn Fn(Size) + Send + Sync;
type AbortedFn = dyn Fn(&AbortReason) + Send + Sync;

/// Callbacks invoked on the producer thread.
///
/// Handlers must be quick; the next tick waits for them. Calling
/// [`StopHandle::stop`] from inside a handler is allowed.
#[derive(Clone, Default)]
pub struct EngineEvents {
    on_target_size_changed: Option<Arc<SizeChangedFn>>,
    on_aborted: Option<Arc<AbortedFn>>,
}

impl std::fmt::Debug for EngineEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineEvents")
            .field("on_target_size_changed", &self.on_target_size_changed.is_some())
            .field("on_aborted", &self.on_aborted.is_some())
            .finish()
    }
}

impl EngineEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the new size whenever the target's size changes.
    pub fn on_target_size_changed(mut self, handler: impl Fn(Size) + Send + Sync + 'static) -> Self {
        self.on_target_size_changed = Some(Arc::new(handler));
        self
    }

    /// Called once when a run ends because of an error.
    pub fn on_aborted(mut self, handler: impl Fn(&AbortReason) + Send + Sync + 'static) -> Self {
        self.on_aborted = Some(Arc::new(handler));
        self
    }

    fn target_size_changed(&self, size: Size) {
        if let Some(handler) = &self.on_target_size_changed {
            handler(size);
        }
    }

    fn aborted(&self, reason: &AbortReason) {
        if let Some(handler) = &self.on_aborted {
            handler(reason);
        }
    }
}

/// Runtime statistics for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    /// Frames captured and published.
    pub frames_captured: u64,

    /// Frames evicted from the queue before anyone dequeued them.
    pub frames_dropped: u64,

    /// Ticks whose work took longer than the frame interval.
    pub ticks_overrun: u64,

    /// Size-change events raised.
    pub size_changes: u64,
}

impl EngineStats {
    /// Drop rate as a percentage.
    pub fn drop_rate(&self) -> f64 {
        if self.frames_captured == 0 {
            return 0.0;
        }
        self.frames_dropped as f64 / self.frames_captured as f64 * 100.0
    }
}

#[derive(Debug, Default)]
struct StatsCounters {
    frames_captured: AtomicU64,
    frames_dropped: AtomicU64,
    ticks_overrun: AtomicU64,
    size_changes: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> EngineStats {
        EngineStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            ticks_overrun: self.ticks_overrun.load(Ordering::Relaxed),
            size_changes: self.size_changes.load(Ordering::Relaxed),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the producer thread and every stop handle.
#[derive(Debug, Default)]
struct RunControl {
    stop_requested: Mutex<bool>,
    stop_signal: Condvar,
    finished: Mutex<bool>,
    finished_signal: Condvar,
    running: AtomicBool,
    producer: OnceLock<ThreadId>,
}

impl RunControl {
    fn request_stop(&self) {
        *lock(&self.stop_requested) = true;
        self.stop_signal.notify_all();
    }

    fn stop_requested(&self) -> bool {
        *lock(&self.stop_requested)
    }

    /// Sleep for `timeout` or until a stop is requested. Returns `true` on stop.
    fn wait_for_stop(&self, timeout: Duration) -> bool {
        let guard = lock(&self.stop_requested);
        let (guard, _) = self
            .stop_signal
            .wait_timeout_while(guard, timeout, |stop| !*stop)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn mark_finished(&self) {
        self.running.store(false, Ordering::SeqCst);
        *lock(&self.finished) = true;
        self.finished_signal.notify_all();
    }

    fn wait_finished(&self) {
        let guard = lock(&self.finished);
        let _guard = self
            .finished_signal
            .wait_while(guard, |finished| !*finished)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn on_producer_thread(&self) -> bool {
        self.producer.get() == Some(&thread::current().id())
    }
}

/// Requests a stop from any thread, including from inside an event handler.
#[derive(Debug, Clone)]
pub struct StopHandle {
    control: Arc<RunControl>,
}

impl StopHandle {
    /// Ask the producer to stop and wait until it has exited.
    ///
    /// Idempotent. On the producer thread itself (an event handler) this only
    /// raises the flag; the thread exits once the handler returns.
    pub fn stop(&self) {
        self.control.request_stop();
        if self.control.on_producer_thread() {
            return;
        }
        self.control.wait_finished();
    }

    pub fn is_running(&self) -> bool {
        self.control.running.load(Ordering::SeqCst)
    }
}

/// Everything a run needs; moved onto the producer thread.
pub struct EngineParts {
    pub source: Box<dyn CaptureSource>,
    pub tracker: TargetTracker,
    pub queue: Arc<FrameQueue>,
    pub pacer: FramePacer,
    pub events: EngineEvents,
}

/// A running (or finished) producer thread.
#[derive(Debug)]
pub struct CaptureEngine {
    handle: Option<JoinHandle<()>>,
    control: Arc<RunControl>,
    stats: Arc<StatsCounters>,
}

impl CaptureEngine {
    /// Spawn the producer thread and begin capturing immediately.
    pub fn spawn(parts: EngineParts) -> FramegrabResult<Self> {
        let control = Arc::new(RunControl::default());
        let stats = Arc::new(StatsCounters::default());
        control.running.store(true, Ordering::SeqCst);

        let thread_control = Arc::clone(&control);
        let thread_stats = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || produce(parts, &thread_control, &thread_stats))
            .map_err(|e| {
                control.mark_finished();
                FramegrabError::Io(e)
            })?;

        Ok(Self {
            handle: Some(handle),
            control,
            stats,
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            control: Arc::clone(&self.control),
        }
    }

    /// Stop the producer and join it. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.control.request_stop();
        if self.control.on_producer_thread() {
            return;
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Capture thread terminated abnormally");
            }
        }
    }

    /// False once the run has ended, whether stopped or aborted.
    pub fn is_running(&self) -> bool {
        self.control.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot()
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Marks the run finished even if an event handler panics.
struct FinishOnDrop<'a>(&'a RunControl);

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        self.0.mark_finished();
    }
}

/// Producer thread body.
fn produce(parts: EngineParts, control: &RunControl, stats: &StatsCounters) {
    let _ = control.producer.set(thread::current().id());
    let _finish = FinishOnDrop(control);
    let EngineParts {
        mut source,
        mut tracker,
        queue,
        pacer,
        events,
    } = parts;

    let clock = CaptureClock::start();
    tracing::info!(
        source = source.name(),
        target_desc = %tracker.target(),
        interval_ms = pacer.interval().as_secs_f64() * 1000.0,
        started_at = clock.epoch_wall(),
        "Capture thread started"
    );

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        run_loop(
            source.as_mut(),
            &mut tracker,
            &queue,
            &pacer,
            &clock,
            &events,
            control,
            stats,
        )
    }));

    // Release capture resources before anyone is told the run is over.
    drop(source);
    drop(tracker);

    let abort = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) if control.stop_requested() => {
            tracing::debug!(error = %e, "Capture error after stop request ignored");
            None
        }
        Ok(Err(e)) => Some(AbortReason::from_error(&e)),
        Err(payload) => Some(AbortReason::from_panic(payload)),
    };

    let summary = stats.snapshot();
    match abort {
        None => tracing::info!(
            frames = summary.frames_captured,
            dropped = summary.frames_dropped,
            elapsed_secs = clock.elapsed_secs(),
            "Capture thread stopped"
        ),
        Some(reason) => {
            tracing::warn!(
                kind = ?reason.kind,
                reason = %reason,
                frames = summary.frames_captured,
                "Capture aborted"
            );
            control.running.store(false, Ordering::SeqCst);
            events.aborted(&reason);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_loop(
    source: &mut dyn CaptureSource,
    tracker: &mut TargetTracker,
    queue: &FrameQueue,
    pacer: &FramePacer,
    clock: &CaptureClock,
    events: &EngineEvents,
    control: &RunControl,
    stats: &StatsCounters,
) -> FramegrabResult<()> {
    let mut sequence = 0u64;

    while !control.stop_requested() {
        let tick_start = Instant::now();

        let tracked = tracker.resolve()?;
        if let Some(size) = tracked.resized {
            stats.size_changes.fetch_add(1, Ordering::Relaxed);
            events.target_size_changed(size);
        }

        let mut frame = source.capture(&tracked.geometry)?;
        if control.stop_requested() {
            break;
        }
        frame.stamp(sequence, clock);
        sequence += 1;
        stats.frames_captured.fetch_add(1, Ordering::Relaxed);
        if queue.enqueue(frame) {
            stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
        }

        let elapsed = tick_start.elapsed();
        if pacer.overran(elapsed) {
            stats.ticks_overrun.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "Capture tick overran its interval"
            );
        }
        if control.wait_for_stop(pacer.remaining(elapsed)) {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CaptureBackend, SyntheticBackend};
    use crate::frame::Frame;
    use crate::tracker::{CaptureTarget, TargetGeometry};
    use framegrab_platform_core::{PixelBuffer, Rect};
    use std::sync::atomic::AtomicUsize;

    struct Panicking;

    impl CaptureSource for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn capture(&mut self, _geometry: &TargetGeometry) -> FramegrabResult<Frame> {
            panic!("driver exploded");
        }
    }

    struct Blank;

    impl CaptureSource for Blank {
        fn name(&self) -> &str {
            "blank"
        }

        fn capture(&mut self, geometry: &TargetGeometry) -> FramegrabResult<Frame> {
            Ok(Frame::new(PixelBuffer::transparent(
                geometry.size.width,
                geometry.size.height,
            )))
        }
    }

    fn parts(source: Box<dyn CaptureSource>, frame_rate: f64, events: EngineEvents) -> EngineParts {
        let backend: Arc<dyn CaptureBackend> = Arc::new(SyntheticBackend::new());
        let tracker =
            TargetTracker::new(CaptureTarget::region(Rect::new(0, 0, 4, 4)), backend).unwrap();
        EngineParts {
            source,
            tracker,
            queue: Arc::new(FrameQueue::default()),
            pacer: FramePacer::new(frame_rate).unwrap(),
            events,
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn stop_is_idempotent() {
        let mut engine = CaptureEngine::spawn(parts(Box::new(Blank), 100.0, EngineEvents::new()))
            .unwrap();
        assert!(engine.is_running());

        engine.stop();
        engine.stop();
        engine.stop_handle().stop();
        assert!(!engine.is_running());
    }

    #[test]
    fn stop_interrupts_a_long_sleep() {
        let mut engine =
            CaptureEngine::spawn(parts(Box::new(Blank), 0.5, EngineEvents::new())).unwrap();
        thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        engine.stop();
        assert!(started.elapsed() < Duration::from_millis(1000));
    }

    #[test]
    fn panic_in_source_becomes_one_abort() {
        let aborts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&aborts);
        let events = EngineEvents::new().on_aborted(move |reason| {
            assert_eq!(reason.kind, AbortKind::CaptureFailed);
            assert!(reason.message.contains("driver exploded"));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let engine = CaptureEngine::spawn(parts(Box::new(Panicking), 100.0, events)).unwrap();
        assert!(wait_until(|| !engine.is_running()));
        drop(engine);
        assert_eq!(aborts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn frames_carry_increasing_sequence_numbers() {
        let parts = parts(Box::new(Blank), 200.0, EngineEvents::new());
        let queue = Arc::clone(&parts.queue);
        let mut engine = CaptureEngine::spawn(parts).unwrap();

        let mut seen = Vec::new();
        assert!(wait_until(|| {
            while let Some(frame) = queue.try_dequeue() {
                seen.push((frame.sequence(), frame.timestamp_ns()));
            }
            seen.len() >= 5
        }));
        engine.stop();

        for pair in seen.windows(2) {
            assert!(pair[1].0 > pair[0].0);
            assert!(pair[1].1 >= pair[0].1);
        }
        assert!(engine.stats().frames_captured >= 5);
    }

    #[test]
    fn drop_rate_is_a_percentage() {
        let stats = EngineStats {
            frames_captured: 10,
            frames_dropped: 4,
            ..EngineStats::default()
        };
        assert!((stats.drop_rate() - 40.0).abs() < f64::EPSILON);
        assert_eq!(EngineStats::default().drop_rate(), 0.0);
    }
}
