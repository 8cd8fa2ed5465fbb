//! Bounded hand-off between the producer thread and the consumer.
//!
//! The queue favours freshness over completeness: when it is full, the
//! oldest frame is discarded to make room for the newest one, so a slow
//! consumer always sees recent content and the producer never blocks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use framegrab_common::error::{FramegrabError, FramegrabResult};

use crate::frame::Frame;

/// Frames held before the oldest is dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 3;

#[derive(Debug)]
struct QueueState {
    frames: VecDeque<Frame>,
    capacity: usize,
}

/// Thread-safe, bounded, drop-oldest FIFO of frames.
#[derive(Debug)]
pub struct FrameQueue {
    state: Mutex<QueueState>,
    dropped: AtomicU64,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> FramegrabResult<Self> {
        check_capacity(capacity)?;
        Ok(Self {
            state: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(capacity),
                capacity,
            }),
            dropped: AtomicU64::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `frame`, evicting the oldest frame first when full.
    ///
    /// Returns `true` when a frame was evicted.
    pub fn enqueue(&self, frame: Frame) -> bool {
        let evicted = {
            let mut state = self.lock();
            let evicted = if state.frames.len() >= state.capacity {
                state.frames.pop_front()
            } else {
                None
            };
            state.frames.push_back(frame);
            evicted
        };

        match evicted {
            Some(old) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(sequence = old.sequence(), "Dropped oldest queued frame");
                true
            }
            None => false,
        }
    }

    /// Remove and return the oldest frame, or `None` immediately when empty.
    pub fn try_dequeue(&self) -> Option<Frame> {
        self.lock().frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Change the capacity, discarding the oldest frames that no longer fit.
    pub fn set_capacity(&self, capacity: usize) -> FramegrabResult<()> {
        check_capacity(capacity)?;
        let discarded: Vec<Frame> = {
            let mut state = self.lock();
            state.capacity = capacity;
            let excess = state.frames.len().saturating_sub(capacity);
            state.frames.drain(..excess).collect()
        };
        self.dropped
            .fetch_add(discarded.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Discard every queued frame. Cleared frames are not counted as drops.
    pub fn clear(&self) {
        let frames = std::mem::take(&mut self.lock().frames);
        drop(frames);
    }

    /// Frames evicted since the queue was created.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self {
            state: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(DEFAULT_QUEUE_CAPACITY),
                capacity: DEFAULT_QUEUE_CAPACITY,
            }),
            dropped: AtomicU64::new(0),
        }
    }
}

fn check_capacity(capacity: usize) -> FramegrabResult<()> {
    if capacity == 0 {
        return Err(FramegrabError::config("frame queue capacity must be at least 1"));
    }
    Ok(())
}
