use std::time::Instant;

use irisgate_core::LandmarkSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("failed to open camera {index}: {source}")]
    Open {
        index: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("no frame ready")]
    NotReady,
    #[error("capture source exhausted")]
    Exhausted,
    #[error("frame read failed: {0}")]
    Read(String),
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// One captured video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the device's capture order, starting at 0.
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    /// Raw pixel data; empty for sources that carry no pixels.
    pub data: Vec<u8>,
    pub captured_at: Instant,
}

/// A capture device owned by the capture thread.
///
/// `grab` is called in a loop. Any error is a transient miss: the frame is
/// skipped and the capture thread retries after a short pause.
pub trait CaptureDevice: Send {
    fn grab(&mut self) -> Result<Frame, CameraError>;
}

/// External face landmark model. `None` when no face is found.
pub trait LandmarkProvider: Send {
    fn locate(&mut self, frame: &Frame) -> Option<LandmarkSet>;
}

/// A camera together with the landmark provider that annotates its frames.
pub struct OpenedCamera {
    pub device: Box<dyn CaptureDevice>,
    pub landmarks: Box<dyn LandmarkProvider>,
}

/// Opens cameras by index.
pub trait CaptureBackend: Send + Sync {
    fn open(&self, camera_index: u32) -> Result<OpenedCamera, CameraError>;
}
