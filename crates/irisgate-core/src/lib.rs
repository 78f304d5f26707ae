//! Per-frame liveness signal processing.
//!
//! Turns a stream of facial landmark sets into a liveliness verdict using
//! four independent signals: eye blinks, iris position changes, iris shape
//! noise and a timed pupil contraction test. All state for a session lives
//! in a [`LivenessProcessor`]; nothing here touches threads or devices.

pub mod blink;
pub mod config;
pub mod landmarks;
pub mod motion;
pub mod processor;
pub mod reaction;
pub mod shape;
pub mod signal;
pub mod verdict;

pub use blink::BlinkDetector;
pub use config::{ConfigError, ConfigOverrides, CountingMode, LivenessConfig};
pub use landmarks::{Carried, LandmarkSet, Observed, Point};
pub use motion::PupilMotionTracker;
pub use processor::{FrameOutcome, LivenessProcessor};
pub use reaction::PupilReactionTester;
pub use shape::IrisShapeMonitor;
pub use signal::IrisGeometry;
pub use verdict::{is_lively, LivenessStats};
