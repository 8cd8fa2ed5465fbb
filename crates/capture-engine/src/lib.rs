//! Framegrab Capture Engine
//!
//! Captures a monitor, a window, or a screen region at a fixed frame rate on
//! a dedicated producer thread and hands frames to a consumer through a small
//! drop-oldest queue. The mechanism that grabs pixels is pluggable, and the
//! cursor is composited on top of whichever one is in use.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                   EngineController                     │
//! │   configure / start / stop / next_frame / events       │
//! │                                                        │
//! │  ┌──────────────── producer thread ─────────────────┐  │
//! │  │                                                  │  │
//! │  │  TargetTracker ──► CursorCompositor ──► stamp    │  │
//! │  │   (geometry,         │                   │       │  │
//! │  │    resize)           ▼                   ▼       │  │
//! │  │               CaptureStrategy       FrameQueue ──┼──┼──► consumer
//! │  │          pixel copy | window print  (drop oldest)│  │
//! │  │          | GPU duplication                       │  │
//! │  └──────────────────────┬───────────────────────────┘  │
//! │                         ▼                              │
//! │                  CaptureBackend                        │
//! │            (Windows | synthetic desktop)               │
//! └────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod controller;
pub mod cursor;
pub mod engine;
pub mod frame;
pub mod queue;
pub mod source;
pub mod strategy;
pub mod tracker;

pub use backend::{enumerate_targets, native_backend, CaptureBackend, SyntheticBackend};
pub use controller::{EngineConfig, EngineController, EngineState};
pub use cursor::CursorCompositor;
pub use engine::{AbortKind, AbortReason, CaptureEngine, EngineEvents, EngineStats, StopHandle};
pub use frame::Frame;
pub use queue::{FrameQueue, DEFAULT_QUEUE_CAPACITY};
pub use source::CaptureSource;
pub use strategy::{CaptureStrategy, StrategyKind};
pub use tracker::{CaptureTarget, TargetGeometry, TargetTracker};
