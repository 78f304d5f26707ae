//! Frame-to-frame iris center displacement.

use crate::config::{CountingMode, LivenessConfig};
use crate::landmarks::Point;

/// Counts iris center jumps larger than a pixel threshold.
///
/// The center fed in may be a carried-forward value; a carried center equal
/// to the stored one produces zero displacement and never counts.
#[derive(Debug, Clone)]
pub struct PupilMotionTracker {
    threshold: f32,
    mode: CountingMode,
    last_center: Option<Point>,
    above: bool,
    moves: u64,
}

impl PupilMotionTracker {
    pub fn new(threshold: f32, mode: CountingMode) -> Self {
        Self {
            threshold,
            mode,
            last_center: None,
            above: false,
            moves: 0,
        }
    }

    pub fn from_config(config: &LivenessConfig) -> Self {
        Self::new(config.pupil_move_threshold, config.move_counting)
    }

    pub fn moves(&self) -> u64 {
        self.moves
    }

    pub fn last_center(&self) -> Option<Point> {
        self.last_center
    }

    /// Feed this frame's chosen center. Returns true if a move was counted.
    pub fn update(&mut self, center: Option<Point>) -> bool {
        let Some(center) = center else {
            return false;
        };

        let mut counted = false;
        if let Some(prev) = self.last_center {
            let displacement = center.distance(prev);
            let past = displacement > self.threshold;
            counted = match self.mode {
                CountingMode::EveryFrame => past,
                CountingMode::RisingEdge => past && !self.above,
            };
            self.above = past;
            if counted {
                self.moves += 1;
                tracing::trace!(displacement, moves = self.moves, "pupil move");
            }
        }
        self.last_center = Some(center);
        counted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> Option<Point> {
        Some(Point::new(x, y))
    }

    #[test]
    fn test_first_center_never_counts() {
        let mut t = PupilMotionTracker::new(2.0, CountingMode::EveryFrame);
        assert!(!t.update(p(100.0, 50.0)));
        assert_eq!(t.moves(), 0);
        assert_eq!(t.last_center(), p(100.0, 50.0));
    }

    #[test]
    fn test_move_must_exceed_threshold() {
        let mut t = PupilMotionTracker::new(2.0, CountingMode::EveryFrame);
        t.update(p(0.0, 0.0));
        // exactly at threshold: not counted
        assert!(!t.update(p(2.0, 0.0)));
        // 3-4-5 triangle
        assert!(t.update(p(5.0, 4.0)));
        assert_eq!(t.moves(), 1);
    }

    #[test]
    fn test_missing_center_keeps_last() {
        let mut t = PupilMotionTracker::new(2.0, CountingMode::EveryFrame);
        t.update(p(0.0, 0.0));
        assert!(!t.update(None));
        assert_eq!(t.last_center(), p(0.0, 0.0));
        assert!(t.update(p(10.0, 0.0)));
    }

    #[test]
    fn test_every_frame_counts_sustained_motion() {
        let mut t = PupilMotionTracker::new(2.0, CountingMode::EveryFrame);
        for i in 0..5 {
            t.update(p(i as f32 * 3.0, 0.0));
        }
        assert_eq!(t.moves(), 4);
    }

    #[test]
    fn test_rising_edge_counts_once_per_excursion() {
        let mut t = PupilMotionTracker::new(2.0, CountingMode::RisingEdge);
        for i in 0..5 {
            t.update(p(i as f32 * 3.0, 0.0));
        }
        assert_eq!(t.moves(), 1);
        // settle, then move again
        t.update(p(12.0, 0.0));
        t.update(p(20.0, 0.0));
        assert_eq!(t.moves(), 2);
    }
}
