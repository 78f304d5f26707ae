//! Debounced blink counting over a smoothed eye aspect ratio.
//!
//! The per-frame mean EAR is averaged over a short sliding window. A blink is
//! emitted on the frame the smoothed value rises back above the threshold,
//! provided the eyes were closed for at least `frames_required` consecutive
//! frames and no earlier blink is still cooling down. Holding the eyes shut
//! therefore counts once, and a noisy reopening cannot count twice.

use std::collections::VecDeque;

use crate::config::{LivenessConfig, MAX_SMOOTH_WINDOW};

/// Mean EAR for the frame: both eyes averaged, else whichever eye is
/// defined, else `threshold` as a neutral value.
pub fn mean_ear(left: Option<f32>, right: Option<f32>, threshold: f32) -> f32 {
    match (left, right) {
        (Some(l), Some(r)) => (l + r) / 2.0,
        (Some(v), None) | (None, Some(v)) => v,
        (None, None) => threshold,
    }
}

/// Outcome of feeding one frame to the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkUpdate {
    pub smoothed_ear: f32,
    pub blink: bool,
}

#[derive(Debug, Clone)]
pub struct BlinkDetector {
    threshold: f32,
    frames_required: u32,
    cooldown_frames: u32,
    window: usize,
    samples: VecDeque<f32>,
    closed_frames: u32,
    cooldown: u32,
    blinks: u64,
}

impl BlinkDetector {
    pub fn new(threshold: f32, frames_required: u32, window: usize, cooldown_frames: u32) -> Self {
        let window = window.clamp(1, MAX_SMOOTH_WINDOW);
        Self {
            threshold,
            frames_required,
            cooldown_frames,
            window,
            samples: VecDeque::with_capacity(window),
            closed_frames: 0,
            cooldown: 0,
            blinks: 0,
        }
    }

    pub fn from_config(config: &LivenessConfig) -> Self {
        Self::new(
            config.ear_threshold,
            config.blink_frames_required,
            config.ear_smooth_window,
            config.blink_cooldown_frames,
        )
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn blinks(&self) -> u64 {
        self.blinks
    }

    /// Frames left before another blink may be counted.
    pub fn cooldown(&self) -> u32 {
        self.cooldown
    }

    pub fn update(&mut self, mean_ear: f32) -> BlinkUpdate {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(mean_ear);
        let smoothed_ear = self.samples.iter().sum::<f32>() / self.samples.len() as f32;

        let mut blink = false;
        if smoothed_ear < self.threshold {
            self.closed_frames += 1;
        } else {
            if self.closed_frames >= self.frames_required && self.cooldown == 0 {
                self.blinks += 1;
                self.cooldown = self.cooldown_frames;
                blink = true;
            }
            self.closed_frames = 0;
        }

        if self.cooldown > 0 {
            self.cooldown -= 1;
        }

        BlinkUpdate {
            smoothed_ear,
            blink,
        }
    }
}
