//! Iris edge-noise monitoring.

use crate::config::{CountingMode, LivenessConfig};

/// Counts frames whose mean iris circularity exceeds a threshold.
///
/// Only irises observed in the current frame are averaged; carried-forward
/// geometry says nothing new about edge noise.
#[derive(Debug, Clone)]
pub struct IrisShapeMonitor {
    threshold: f32,
    mode: CountingMode,
    above: bool,
    edges: u64,
}

impl IrisShapeMonitor {
    pub fn new(threshold: f32, mode: CountingMode) -> Self {
        Self {
            threshold,
            mode,
            above: false,
            edges: 0,
        }
    }

    pub fn from_config(config: &LivenessConfig) -> Self {
        Self::new(config.iris_edge_threshold, config.edge_counting)
    }

    pub fn edges(&self) -> u64 {
        self.edges
    }

    /// Feed the circularities of the irises seen this frame.
    pub fn update(&mut self, circularities: &[f32]) -> bool {
        if circularities.is_empty() {
            return false;
        }
        let mean = circularities.iter().sum::<f32>() / circularities.len() as f32;
        let past = mean > self.threshold;
        let counted = match self.mode {
            CountingMode::EveryFrame => past,
            CountingMode::RisingEdge => past && !self.above,
        };
        self.above = past;
        if counted {
            self.edges += 1;
            tracing::trace!(circularity = mean, edges = self.edges, "iris edge event");
        }
        counted
    }
}
