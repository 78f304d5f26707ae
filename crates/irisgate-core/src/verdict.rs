use serde::{Deserialize, Serialize};

/// Liveliness verdict over a session's accumulated evidence.
///
/// Any one signal is enough and the verdict never reverts: one counted
/// blink, one counted pupil move, or a smoothed contraction above `margin`.
pub fn is_lively(blinks: u64, moves: u64, contraction: Option<f32>, margin: f32) -> bool {
    blinks > 0 || contraction.is_some_and(|c| c > margin) || moves > 0
}

/// Immutable snapshot of a session's counters and read-outs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LivenessStats {
    pub blinks: u64,
    pub moves: u64,
    pub edges: u64,
    /// Smoothed pupil contraction ratio; `None` until a trial resolves.
    pub contraction: Option<f32>,
    pub lively: bool,
    pub frames_processed: u64,
    pub frames_without_face: u64,
    /// Most recent smoothed EAR, for live display.
    pub smoothed_ear: Option<f32>,
}
