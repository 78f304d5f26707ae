//! Landmark recordings.
//!
//! A recording is a JSON-lines file, one captured frame per line:
//!
//! ```text
//! {"t": 0.000, "landmarks": [[312.4, 240.1], ...]}
//! {"t": 0.033, "landmarks": null}
//! ```
//!
//! `t` is seconds since capture start; `width`/`height` default to 640×480;
//! `landmarks` is `null` (or absent) on frames where no face was found.
//! [`RecordingBackend`] serves `camera{index}.jsonl` files as cameras, paced
//! by their timestamps, with a landmark provider that replays the recorded
//! points for each frame.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use irisgate_core::LandmarkSet;
use serde::Deserialize;
use thiserror::Error;

use crate::camera::{CameraError, CaptureBackend, CaptureDevice, Frame, LandmarkProvider, OpenedCamera};

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("failed to read recording {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: timestamp {t} is not a non-negative number of seconds")]
    Timestamp { line: usize, t: f64 },
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedFrame {
    /// Seconds since the start of the recording.
    pub t: f64,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub landmarks: Option<LandmarkSet>,
}

#[derive(Debug, Clone, Default)]
pub struct Recording {
    frames: Vec<RecordedFrame>,
}

impl Recording {
    pub fn load(path: &Path) -> Result<Self, RecordingError> {
        let text = std::fs::read_to_string(path).map_err(|source| RecordingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, RecordingError> {
        let mut frames = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            if raw.trim().is_empty() {
                continue;
            }
            let frame: RecordedFrame = serde_json::from_str(raw)
                .map_err(|source| RecordingError::Parse { line, source })?;
            if !(frame.t.is_finite() && frame.t >= 0.0) {
                return Err(RecordingError::Timestamp { line, t: frame.t });
            }
            frames.push(frame);
        }
        Ok(Self { frames })
    }

    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Offset of frame `i` from the first frame; zero for out-of-order stamps.
    pub fn offset(&self, i: usize) -> Duration {
        let (Some(first), Some(frame)) = (self.frames.first(), self.frames.get(i)) else {
            return Duration::ZERO;
        };
        Duration::try_from_secs_f64(frame.t - first.t).unwrap_or(Duration::ZERO)
    }
}

/// Plays a recording back as a camera, releasing each frame at its
/// recorded offset from the first grab.
pub struct RecordingCamera {
    recording: Arc<Recording>,
    next: usize,
    started: Option<Instant>,
}

impl RecordingCamera {
    pub fn new(recording: Arc<Recording>) -> Self {
        Self {
            recording,
            next: 0,
            started: None,
        }
    }
}

impl CaptureDevice for RecordingCamera {
    fn grab(&mut self) -> Result<Frame, CameraError> {
        let Some(rec) = self.recording.frames().get(self.next) else {
            return Err(CameraError::Exhausted);
        };
        let now = Instant::now();
        let started = *self.started.get_or_insert(now);
        if now < started + self.recording.offset(self.next) {
            return Err(CameraError::NotReady);
        }

        let frame = Frame {
            sequence: self.next as u64,
            width: rec.width,
            height: rec.height,
            data: Vec::new(),
            captured_at: now,
        };
        self.next += 1;
        Ok(frame)
    }
}

/// Returns the landmarks recorded for each frame's sequence number.
pub struct RecordedLandmarks {
    recording: Arc<Recording>,
}

impl RecordedLandmarks {
    pub fn new(recording: Arc<Recording>) -> Self {
        Self { recording }
    }
}

impl LandmarkProvider for RecordedLandmarks {
    fn locate(&mut self, frame: &Frame) -> Option<LandmarkSet> {
        let i = usize::try_from(frame.sequence).ok()?;
        self.recording.frames().get(i)?.landmarks.clone()
    }
}

/// Serves `{dir}/camera{index}.jsonl` recordings as cameras.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    dir: PathBuf,
}

impl RecordingBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, camera_index: u32) -> PathBuf {
        self.dir.join(format!("camera{camera_index}.jsonl"))
    }
}

impl CaptureBackend for RecordingBackend {
    fn open(&self, camera_index: u32) -> Result<OpenedCamera, CameraError> {
        let path = self.path_for(camera_index);
        let recording = Recording::load(&path).map_err(|e| CameraError::Open {
            index: camera_index,
            source: Box::new(e),
        })?;
        tracing::info!(
            camera_index,
            path = %path.display(),
            frames = recording.len(),
            "recording opened as camera"
        );
        let recording = Arc::new(recording);
        Ok(OpenedCamera {
            device: Box::new(RecordingCamera::new(Arc::clone(&recording))),
            landmarks: Box::new(RecordedLandmarks::new(recording)),
        })
    }
}
