//! Capture plumbing around the liveness core.
//!
//! Cameras and landmark models are external; this crate defines the seams
//! they plug into ([`CaptureDevice`], [`LandmarkProvider`],
//! [`CaptureBackend`]), the threaded latest-frame-wins [`FrameSource`], the
//! blink [`Notifier`] capability, and a file-backed landmark recording that
//! stands in for a camera.

pub mod camera;
pub mod frame_source;
pub mod notifier;
pub mod recording;

pub use camera::{CameraError, CaptureBackend, CaptureDevice, Frame, LandmarkProvider, OpenedCamera};
pub use frame_source::FrameSource;
pub use notifier::{NoopNotifier, Notifier, NotifyError, RecordingNotifier, SerialNotifier};
pub use recording::{Recording, RecordingBackend, RecordingError};
