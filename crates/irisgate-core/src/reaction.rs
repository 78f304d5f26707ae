//! Pupil light-reflex test.
//!
//! A trial records the iris radius when it starts and compares it with the
//! radius seen once the test duration has elapsed. The relative shrinkage of
//! each resolved trial is folded into an exponentially smoothed value, so a
//! single noisy trial cannot dominate. Positive values mean the iris got
//! smaller, consistent with a live pupil reacting to light.

use std::time::{Duration, Instant};

use crate::config::LivenessConfig;

const MAX_TRIAL_SECS: f32 = 10.0;
const DEFAULT_TRIAL: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactionTrial {
    pub start_radius: f32,
    pub started_at: Instant,
}

#[derive(Debug, Clone)]
pub struct PupilReactionTester {
    duration: Duration,
    alpha: f32,
    min_radius: f32,
    trial: Option<ReactionTrial>,
    value: Option<f32>,
    trials_resolved: u64,
}

impl PupilReactionTester {
    pub fn new(duration: Duration, alpha: f32, min_radius: f32) -> Self {
        Self {
            duration,
            alpha,
            min_radius,
            trial: None,
            value: None,
            trials_resolved: 0,
        }
    }

    pub fn from_config(config: &LivenessConfig) -> Self {
        // NaN survives the clamp and falls back to the default length
        let secs = config.reaction_test_duration_secs.clamp(0.0, MAX_TRIAL_SECS);
        Self::new(
            Duration::try_from_secs_f32(secs).unwrap_or(DEFAULT_TRIAL),
            config.reaction_smoothing,
            config.reaction_min_radius,
        )
    }

    /// Smoothed contraction ratio, unset until the first valid trial.
    pub fn value(&self) -> Option<f32> {
        self.value
    }

    pub fn trial(&self) -> Option<&ReactionTrial> {
        self.trial.as_ref()
    }

    /// Trials that produced a shrinkage ratio.
    pub fn trials_resolved(&self) -> u64 {
        self.trials_resolved
    }

    /// Feed this frame's active iris radius. Returns the shrinkage ratio of a
    /// trial resolved on this frame, if any.
    pub fn update(&mut self, radius: Option<f32>, now: Instant) -> Option<f32> {
        if self.trial.is_none() {
            if let Some(r) = radius.filter(|r| *r > 0.0) {
                self.trial = Some(ReactionTrial {
                    start_radius: r,
                    started_at: now,
                });
            }
        }

        let trial = self.trial?;
        if now.saturating_duration_since(trial.started_at) < self.duration {
            return None;
        }

        // The trial ends here whether or not the end sample is usable.
        self.trial = None;
        let current = radius.filter(|r| *r > self.min_radius)?;
        let shrinkage = (trial.start_radius - current) / trial.start_radius;
        self.value = Some(match self.value {
            None => shrinkage,
            Some(prev) => self.alpha * shrinkage + (1.0 - self.alpha) * prev,
        });
        self.trials_resolved += 1;
        tracing::debug!(
            shrinkage,
            smoothed = ?self.value,
            start_radius = trial.start_radius,
            end_radius = current,
            "pupil reaction trial resolved"
        );
        Some(shrinkage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tester() -> PupilReactionTester {
        PupilReactionTester::new(Duration::from_millis(800), 0.35, 3.0)
    }

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    #[test]
    fn test_from_config_survives_absurd_duration() {
        for secs in [1e30, f32::NAN, -3.0] {
            let cfg = LivenessConfig {
                reaction_test_duration_secs: secs,
                ..Default::default()
            };
            let mut r = PupilReactionTester::from_config(&cfg);
            r.update(Some(10.0), Instant::now());
            assert!(r.trials_resolved() <= 1);
        }
    }

    #[test]
    fn test_unset_until_first_trial() {
        let mut r = tester();
        let t0 = Instant::now();
        assert!(r.update(Some(10.0), t0).is_none());
        assert!(r.update(Some(9.5), at(t0, 400)).is_none());
        assert!(r.value().is_none());
        assert!(r.trial().is_some());
    }

    #[test]
    fn test_first_trial_sets_value_directly() {
        let mut r = tester();
        let t0 = Instant::now();
        r.update(Some(10.0), t0);
        let shrink = r.update(Some(9.0), at(t0, 800)).unwrap();
        assert!((shrink - 0.1).abs() < 1e-6);
        assert!((r.value().unwrap() - 0.1).abs() < 1e-6);
        assert!(r.trial().is_none());
    }

    #[test]
    fn test_second_trial_is_smoothed() {
        let mut r = tester();
        let t0 = Instant::now();
        r.update(Some(10.0), t0);
        r.update(Some(9.0), at(t0, 800));
        // next frame opens a fresh trial
        r.update(Some(10.0), at(t0, 850));
        r.update(Some(8.0), at(t0, 1650));
        let expected = 0.35 * 0.2 + 0.65 * 0.1;
        assert!((r.value().unwrap() - expected).abs() < 1e-6);
        assert_eq!(r.trials_resolved(), 2);
    }

    #[test]
    fn test_small_end_radius_discards_but_clears_trial() {
        let mut r = tester();
        let t0 = Instant::now();
        r.update(Some(10.0), t0);
        assert!(r.update(Some(2.0), at(t0, 900)).is_none());
        assert!(r.value().is_none());
        assert!(r.trial().is_none());
        // restarts on the next available radius
        r.update(Some(10.0), at(t0, 950));
        assert_eq!(r.trial().unwrap().start_radius, 10.0);
    }

    #[test]
    fn test_missing_end_radius_clears_trial() {
        let mut r = tester();
        let t0 = Instant::now();
        r.update(Some(10.0), t0);
        assert!(r.update(None, at(t0, 1000)).is_none());
        assert!(r.trial().is_none());
        assert!(r.value().is_none());
    }

    #[test]
    fn test_zero_radius_never_starts_trial() {
        let mut r = tester();
        let t0 = Instant::now();
        r.update(Some(0.0), t0);
        assert!(r.trial().is_none());
        r.update(None, t0);
        assert!(r.trial().is_none());
    }

    #[test]
    fn test_dilation_is_negative() {
        let mut r = tester();
        let t0 = Instant::now();
        r.update(Some(8.0), t0);
        r.update(Some(10.0), at(t0, 800));
        assert!(r.value().unwrap() < 0.0);
    }
}
