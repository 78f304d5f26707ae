//! `irisgate replay` runs the detectors over a landmark recording offline.

use std::time::Instant;

use irisgate_core::{LivenessConfig, LivenessProcessor, LivenessStats};
use irisgate_hw::Recording;

/// Feed every recorded frame through a fresh processor, using the recorded
/// timestamps as frame times, and return the final stats.
pub fn replay(recording: &Recording, config: LivenessConfig) -> LivenessStats {
    let t0 = Instant::now();
    let mut processor = LivenessProcessor::new(config);
    for (i, frame) in recording.frames().iter().enumerate() {
        let outcome = processor.process(frame.landmarks.as_ref(), t0 + recording.offset(i));
        if outcome.blink {
            tracing::debug!(frame = i, t = frame.t, "blink");
        }
    }
    processor.stats()
}
