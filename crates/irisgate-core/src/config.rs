use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} = {value} is outside the accepted range {min}..={max}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// How a threshold detector turns "past threshold" frames into events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountingMode {
    /// Count every frame the signal is past threshold.
    #[default]
    EveryFrame,
    /// Count once per excursion past threshold.
    RisingEdge,
}

/// Detector configuration, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Smoothed EAR below which the eyes count as closed.
    pub ear_threshold: f32,
    /// Consecutive closed frames needed for one blink.
    pub blink_frames_required: u32,
    /// Iris center displacement (pixels) that counts as a pupil move.
    pub pupil_move_threshold: f32,
    /// Mean iris circularity noise that counts as an edge event.
    pub iris_edge_threshold: f32,
    /// Sliding window length for EAR smoothing, in frames.
    pub ear_smooth_window: usize,
    /// Refractory period after a blink, in frames.
    pub blink_cooldown_frames: u32,
    /// Length of one pupil reaction trial.
    pub reaction_test_duration_secs: f32,
    /// Exponential smoothing factor applied across reaction trials.
    pub reaction_smoothing: f32,
    /// Radius (pixels) below which a trial end sample is discarded.
    pub reaction_min_radius: f32,
    /// Contraction above which the reaction alone proves liveliness.
    pub reaction_margin: f32,
    pub move_counting: CountingMode,
    pub edge_counting: CountingMode,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.21,
            blink_frames_required: 2,
            pupil_move_threshold: 2.0,
            iris_edge_threshold: 0.12,
            ear_smooth_window: 4,
            blink_cooldown_frames: 10,
            reaction_test_duration_secs: 0.8,
            reaction_smoothing: 0.35,
            reaction_min_radius: 3.0,
            reaction_margin: 0.08,
            move_counting: CountingMode::EveryFrame,
            edge_counting: CountingMode::EveryFrame,
        }
    }
}

/// Longest EAR smoothing window, in frames.
pub const MAX_SMOOTH_WINDOW: usize = 64;
/// Longest post-blink cooldown, in frames.
pub const MAX_COOLDOWN_FRAMES: u32 = 300;
const MIN_REACTION_SECS: f64 = 0.05;
const MAX_REACTION_SECS: f64 = 10.0;
const MAX_MIN_RADIUS: f64 = 100.0;

fn check(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    // NaN fails both comparisons, so test for containment rather than exclusion
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

impl LivenessConfig {
    /// Reject values outside the operator-facing ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("ear_threshold", self.ear_threshold as f64, 0.08, 0.40)?;
        check(
            "blink_frames_required",
            self.blink_frames_required as f64,
            1.0,
            6.0,
        )?;
        check(
            "pupil_move_threshold",
            self.pupil_move_threshold as f64,
            0.5,
            10.0,
        )?;
        check(
            "iris_edge_threshold",
            self.iris_edge_threshold as f64,
            0.01,
            0.30,
        )?;
        check(
            "ear_smooth_window",
            self.ear_smooth_window as f64,
            1.0,
            MAX_SMOOTH_WINDOW as f64,
        )?;
        check(
            "blink_cooldown_frames",
            self.blink_cooldown_frames as f64,
            0.0,
            MAX_COOLDOWN_FRAMES as f64,
        )?;
        check(
            "reaction_test_duration_secs",
            self.reaction_test_duration_secs as f64,
            MIN_REACTION_SECS,
            MAX_REACTION_SECS,
        )?;
        check(
            "reaction_smoothing",
            self.reaction_smoothing as f64,
            f64::MIN_POSITIVE,
            1.0,
        )?;
        check(
            "reaction_min_radius",
            self.reaction_min_radius as f64,
            0.0,
            MAX_MIN_RADIUS,
        )?;
        check("reaction_margin", self.reaction_margin as f64, 0.0, 1.0)?;
        Ok(())
    }

    /// Return a copy with every `Some` field of `overrides` applied.
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> Self {
        let mut out = self.clone();
        if let Some(v) = overrides.ear_threshold {
            out.ear_threshold = v;
        }
        if let Some(v) = overrides.blink_frames_required {
            out.blink_frames_required = v;
        }
        if let Some(v) = overrides.pupil_move_threshold {
            out.pupil_move_threshold = v;
        }
        if let Some(v) = overrides.iris_edge_threshold {
            out.iris_edge_threshold = v;
        }
        if let Some(v) = overrides.move_counting {
            out.move_counting = v;
        }
        if let Some(v) = overrides.edge_counting {
            out.edge_counting = v;
        }
        out
    }
}

/// Caller-supplied settings for one session. Absent keys keep the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ear_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blink_frames_required: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pupil_move_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iris_edge_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_counting: Option<CountingMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_counting: Option<CountingMode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        LivenessConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let cfg = LivenessConfig {
            ear_threshold: 0.5,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                name: "ear_threshold",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_nan() {
        let cfg = LivenessConfig {
            pupil_move_threshold: f32::NAN,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_blink_frames_and_window() {
        let cfg = LivenessConfig {
            blink_frames_required: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = LivenessConfig {
            ear_smooth_window: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_unbounded_window_and_trial_length() {
        let cfg = LivenessConfig {
            ear_smooth_window: MAX_SMOOTH_WINDOW + 1,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange {
                name: "ear_smooth_window",
                ..
            })
        ));

        for secs in [1e30, f32::INFINITY, 0.0, -1.0] {
            let cfg = LivenessConfig {
                reaction_test_duration_secs: secs,
                ..Default::default()
            };
            assert!(matches!(
                cfg.validate(),
                Err(ConfigError::OutOfRange {
                    name: "reaction_test_duration_secs",
                    ..
                })
            ));
        }

        let cfg = LivenessConfig {
            blink_cooldown_frames: u32::MAX,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let cfg = LivenessConfig {
            ear_smooth_window: MAX_SMOOTH_WINDOW,
            reaction_test_duration_secs: 10.0,
            blink_cooldown_frames: MAX_COOLDOWN_FRAMES,
            ..Default::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn test_overrides_merge_onto_base() {
        let overrides: ConfigOverrides =
            serde_json::from_str(r#"{"ear_threshold": 0.25, "blink_frames_required": 3}"#)
                .unwrap();
        let cfg = LivenessConfig::default().with_overrides(&overrides);
        assert!((cfg.ear_threshold - 0.25).abs() < 1e-6);
        assert_eq!(cfg.blink_frames_required, 3);
        // untouched
        assert!((cfg.pupil_move_threshold - 2.0).abs() < 1e-6);
        assert_eq!(cfg.move_counting, CountingMode::EveryFrame);
    }

    #[test]
    fn test_overrides_reject_unknown_keys() {
        let res = serde_json::from_str::<ConfigOverrides>(r#"{"ear_treshold": 0.25}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: LivenessConfig =
            serde_json::from_str(r#"{"move_counting": "rising_edge"}"#).unwrap();
        assert_eq!(cfg.move_counting, CountingMode::RisingEdge);
        assert_eq!(cfg.ear_smooth_window, 4);
    }
}
