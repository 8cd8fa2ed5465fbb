//! Clock and pacing utilities for the capture loop.
//!
//! Every frame produced during a run is stamped relative to a monotonic
//! epoch recorded when the producer starts. This module provides:
//! - The capture epoch and conversions from `Instant`s to run-relative ns
//! - Fixed-interval frame pacing without catch-up

use std::time::{Duration, Instant};

use crate::error::{FramegrabError, FramegrabResult};

/// A capture clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment the producer started).
#[derive(Debug, Clone)]
pub struct CaptureClock {
    /// The instant the run started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl CaptureClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get nanoseconds elapsed since the epoch.
    pub fn elapsed_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Get seconds elapsed since the epoch.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Nanoseconds between the epoch and `instant` (zero if earlier).
    pub fn ns_at(&self, instant: Instant) -> u64 {
        instant.saturating_duration_since(self.epoch).as_nanos() as u64
    }

    /// Wall-clock time at epoch.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

}

/// Fixed-interval pacer for a producer loop.
///
/// The pacer never accumulates debt: a tick that overruns its interval is
/// followed immediately by the next one, and skipped ticks are not replayed.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    interval: Duration,
}

impl FramePacer {
    /// Create a pacer targeting `frame_rate` ticks per second.
    pub fn new(frame_rate: f64) -> FramegrabResult<Self> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(FramegrabError::config(format!(
                "frame rate must be greater than 0 (got {frame_rate})"
            )));
        }
        let interval = Duration::try_from_secs_f64(1.0 / frame_rate).map_err(|_| {
            FramegrabError::config(format!(
                "frame rate {frame_rate} is too low for a representable interval"
            ))
        })?;
        Ok(Self { interval })
    }

    /// Target interval between tick starts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long to sleep after a tick that took `elapsed`.
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }

    /// Whether a tick that took `elapsed` exceeded its budget.
    pub fn overran(&self, elapsed: Duration) -> bool {
        elapsed > self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = CaptureClock::start();
        assert!(clock.elapsed_ns() < 1_000_000_000);
    }

    #[test]
    fn test_ns_at_saturates_before_epoch() {
        let before = Instant::now();
        let clock = CaptureClock::start();
        assert_eq!(clock.ns_at(before), 0);
        let later = Instant::now() + Duration::from_secs(5);
        assert!(clock.ns_at(later) >= 5_000_000_000);
    }

    #[test]
    fn test_pacer_interval() {
        let pacer = FramePacer::new(50.0).unwrap();
        assert_eq!(pacer.interval(), Duration::from_millis(20));
        assert_eq!(
            pacer.remaining(Duration::from_millis(5)),
            Duration::from_millis(15)
        );
    }

    #[test]
    fn test_pacer_never_goes_negative() {
        let pacer = FramePacer::new(60.0).unwrap();
        assert_eq!(pacer.remaining(Duration::from_millis(40)), Duration::ZERO);
        assert!(pacer.overran(Duration::from_millis(40)));
        assert!(!pacer.overran(Duration::from_millis(1)));
    }

    #[test]
    fn test_pacer_rejects_non_positive_rates() {
        assert!(FramePacer::new(0.0).is_err());
        assert!(FramePacer::new(-30.0).is_err());
        assert!(FramePacer::new(f64::NAN).is_err());
        assert!(FramePacer::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_pacer_rejects_rates_with_unrepresentable_interval() {
        let err = FramePacer::new(1e-20).unwrap_err();
        assert!(matches!(err, FramegrabError::Config { .. }));
        assert!(FramePacer::new(1e-3).is_ok());
    }
}
