//! Per-frame orchestration of all detectors for one session.

use std::time::Instant;

use crate::blink::{mean_ear, BlinkDetector};
use crate::config::LivenessConfig;
use crate::landmarks::{Carried, LandmarkSet, Observed};
use crate::motion::PupilMotionTracker;
use crate::reaction::PupilReactionTester;
use crate::shape::IrisShapeMonitor;
use crate::signal::{eye_aspect_ratio, IrisGeometry};
use crate::verdict::{is_lively, LivenessStats};

/// What happened on one processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameOutcome {
    /// Landmarks were present for this frame.
    pub face: bool,
    pub smoothed_ear: Option<f32>,
    pub blink: bool,
    pub moved: bool,
    pub edge: bool,
    /// Shrinkage ratio of a reaction trial resolved on this frame.
    pub reaction: Option<f32>,
    pub lively: bool,
}

/// Owns every detector and the carried-forward iris geometry of a session.
///
/// Frames without landmarks advance no detector. When only one organ is
/// missing, its last-known geometry stands in so motion and reaction
/// tracking stay continuous.
#[derive(Debug, Clone)]
pub struct LivenessProcessor {
    config: LivenessConfig,
    blink: BlinkDetector,
    motion: PupilMotionTracker,
    shape: IrisShapeMonitor,
    reaction: PupilReactionTester,
    left_iris: Carried<IrisGeometry>,
    right_iris: Carried<IrisGeometry>,
    frames_processed: u64,
    frames_without_face: u64,
    smoothed_ear: Option<f32>,
    lively: bool,
}

impl LivenessProcessor {
    pub fn new(config: LivenessConfig) -> Self {
        Self {
            blink: BlinkDetector::from_config(&config),
            motion: PupilMotionTracker::from_config(&config),
            shape: IrisShapeMonitor::from_config(&config),
            reaction: PupilReactionTester::from_config(&config),
            left_iris: Carried::new(),
            right_iris: Carried::new(),
            frames_processed: 0,
            frames_without_face: 0,
            smoothed_ear: None,
            lively: false,
            config,
        }
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    pub fn is_lively(&self) -> bool {
        self.lively
    }

    pub fn process(&mut self, landmarks: Option<&LandmarkSet>, now: Instant) -> FrameOutcome {
        self.frames_processed += 1;

        let Some(lm) = landmarks else {
            self.frames_without_face += 1;
            tracing::trace!(frame = self.frames_processed, "no face");
            return FrameOutcome {
                lively: self.lively,
                smoothed_ear: self.smoothed_ear,
                ..Default::default()
            };
        };

        // Blink
        let left_ear = lm.left_eye().and_then(|e| eye_aspect_ratio(&e));
        let right_ear = lm.right_eye().and_then(|e| eye_aspect_ratio(&e));
        let ear = mean_ear(left_ear, right_ear, self.blink.threshold());
        let blink = self.blink.update(ear);
        self.smoothed_ear = Some(blink.smoothed_ear);

        // Iris geometry, fresh where visible, carried otherwise
        let left_fresh = lm.left_iris().and_then(|p| IrisGeometry::from_points(&p));
        let right_fresh = lm.right_iris().and_then(|p| IrisGeometry::from_points(&p));
        let left = self.left_iris.observe(left_fresh);
        let right = self.right_iris.observe(right_fresh);

        let chosen = left.as_ref().or(right.as_ref()).map(Observed::value);

        // Reaction
        let reaction = self.reaction.update(chosen.map(|g| g.radius), now);

        // Motion
        let moved = self.motion.update(chosen.map(|g| g.center));

        // Shape, fresh irises only
        let fresh: Vec<f32> = [left.as_ref(), right.as_ref()]
            .into_iter()
            .flatten()
            .filter(|o| o.is_fresh())
            .map(|o| o.value().circularity)
            .collect();
        let edge = self.shape.update(&fresh);

        if blink.blink || moved || reaction.is_some() {
            tracing::debug!(
                frame = self.frames_processed,
                blink = blink.blink,
                moved,
                reaction = ?reaction,
                blinks = self.blink.blinks(),
                moves = self.motion.moves(),
                "liveness evidence"
            );
        }

        let was_lively = self.lively;
        self.lively = self.lively
            || is_lively(
                self.blink.blinks(),
                self.motion.moves(),
                self.reaction.value(),
                self.config.reaction_margin,
            );
        if self.lively && !was_lively {
            tracing::info!(frame = self.frames_processed, "subject judged lively");
        }

        FrameOutcome {
            face: true,
            smoothed_ear: Some(blink.smoothed_ear),
            blink: blink.blink,
            moved,
            edge,
            reaction,
            lively: self.lively,
        }
    }

    pub fn stats(&self) -> LivenessStats {
        LivenessStats {
            blinks: self.blink.blinks(),
            moves: self.motion.moves(),
            edges: self.shape.edges(),
            contraction: self.reaction.value(),
            lively: self.lively,
            frames_processed: self.frames_processed,
            frames_without_face: self.frames_without_face,
            smoothed_ear: self.smoothed_ear,
        }
    }
}
