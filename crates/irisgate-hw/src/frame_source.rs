//! Threaded camera reader with a bounded latest-frame-wins buffer.
//!
//! The capture thread grabs frames at whatever cadence the device allows
//! and pushes them into a small buffer. When the buffer is full the oldest
//! frame is discarded, so the consumer always sees fresh data and never a
//! backlog.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::camera::{CameraError, CaptureDevice, Frame};

/// Default buffer capacity.
pub const DEFAULT_CAPACITY: usize = 2;
/// Longest `read` waits for a frame.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);
/// Pause after a capture miss before retrying.
const MISS_BACKOFF: Duration = Duration::from_millis(10);

pub struct FrameSource {
    rx: Receiver<Frame>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    capture: Option<JoinHandle<()>>,
}

impl FrameSource {
    /// Hand `device` to a new capture thread and start buffering frames.
    pub fn start(device: Box<dyn CaptureDevice>, capacity: usize) -> Result<Self, CameraError> {
        let (tx, rx) = bounded::<Frame>(capacity.max(1));
        let running = Arc::new(AtomicBool::new(true));
        let dropped = Arc::new(AtomicU64::new(0));

        let drain = rx.clone();
        let thread_running = Arc::clone(&running);
        let thread_dropped = Arc::clone(&dropped);
        let capture = std::thread::Builder::new()
            .name("irisgate-capture".into())
            .spawn(move || capture_loop(device, tx, drain, thread_running, thread_dropped))
            .map_err(CameraError::Spawn)?;

        Ok(Self {
            rx,
            running,
            dropped,
            capture: Some(capture),
        })
    }

    /// Next buffered frame, waiting at most [`READ_TIMEOUT`].
    pub fn read(&self) -> Option<Frame> {
        self.read_timeout(READ_TIMEOUT)
    }

    pub fn read_timeout(&self, timeout: Duration) -> Option<Frame> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Frames discarded to make room for newer ones.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.capture.is_some()
    }

    /// Halt capture and release the device. Later calls do nothing.
    pub fn stop(&mut self) {
        let Some(handle) = self.capture.take() else {
            return;
        };
        self.running.store(false, Ordering::Release);
        if handle.join().is_err() {
            tracing::error!("capture thread panicked");
        }
        tracing::debug!(dropped = self.dropped(), "frame source stopped");
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(
    mut device: Box<dyn CaptureDevice>,
    tx: Sender<Frame>,
    drain: Receiver<Frame>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
) {
    tracing::debug!("capture thread started");
    while running.load(Ordering::Acquire) {
        match device.grab() {
            Ok(frame) => publish(&tx, &drain, frame, &dropped),
            Err(e) => {
                tracing::trace!(error = %e, "capture miss");
                std::thread::sleep(MISS_BACKOFF);
            }
        }
    }
    // Device is released here, on the thread that owned it.
    drop(device);
    tracing::debug!("capture thread exiting");
}

fn publish(tx: &Sender<Frame>, drain: &Receiver<Frame>, mut frame: Frame, dropped: &AtomicU64) {
    loop {
        match tx.try_send(frame) {
            Ok(()) => return,
            Err(TrySendError::Full(f)) => {
                if drain.try_recv().is_ok() {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
                frame = f;
            }
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    /// Emits `total` frames as fast as asked, then misses forever.
    struct Burst {
        next: u64,
        total: u64,
        released: Arc<AtomicBool>,
    }

    impl CaptureDevice for Burst {
        fn grab(&mut self) -> Result<Frame, CameraError> {
            if self.next >= self.total {
                return Err(CameraError::Exhausted);
            }
            let frame = Frame {
                sequence: self.next,
                width: 4,
                height: 4,
                data: vec![0; 16],
                captured_at: Instant::now(),
            };
            self.next += 1;
            Ok(frame)
        }
    }

    impl Drop for Burst {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn burst(total: u64) -> (Box<dyn CaptureDevice>, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        let dev = Burst {
            next: 0,
            total,
            released: Arc::clone(&released),
        };
        (Box::new(dev), released)
    }

    /// Wait until the capture thread has pushed everything it will push.
    fn settle() {
        std::thread::sleep(Duration::from_millis(100));
    }

    #[test]
    fn test_keeps_only_newest_frames() {
        let (dev, _) = burst(10);
        let mut src = FrameSource::start(dev, 2).unwrap();
        settle();
        let a = src.read().unwrap();
        let b = src.read().unwrap();
        assert_eq!((a.sequence, b.sequence), (8, 9));
        assert!(src.read_timeout(Duration::from_millis(20)).is_none());
        assert_eq!(src.dropped(), 8);
        src.stop();
    }

    #[test]
    fn test_read_times_out_without_frames() {
        let (dev, _) = burst(0);
        let src = FrameSource::start(dev, 2).unwrap();
        let t = Instant::now();
        assert!(src.read().is_none());
        assert!(t.elapsed() >= READ_TIMEOUT);
    }

    #[test]
    fn test_stop_releases_device_and_is_idempotent() {
        let (dev, released) = burst(3);
        let mut src = FrameSource::start(dev, 2).unwrap();
        assert!(src.is_running());
        src.stop();
        assert!(released.load(Ordering::SeqCst));
        assert!(!src.is_running());
        src.stop();
    }

    #[test]
    fn test_drop_stops_capture() {
        let (dev, released) = burst(3);
        let src = FrameSource::start(dev, 2).unwrap();
        drop(src);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_misses_are_retried() {
        struct Flaky {
            calls: Arc<AtomicUsize>,
        }
        impl CaptureDevice for Flaky {
            fn grab(&mut self) -> Result<Frame, CameraError> {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n % 2 == 0 {
                    return Err(CameraError::Read("hiccup".into()));
                }
                Ok(Frame {
                    sequence: n as u64,
                    width: 1,
                    height: 1,
                    data: vec![0],
                    captured_at: Instant::now(),
                })
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let dev = Flaky {
            calls: Arc::clone(&calls),
        };
        let mut src = FrameSource::start(Box::new(dev), 2).unwrap();
        let frame = src.read().unwrap();
        assert_eq!(frame.sequence % 2, 1);
        src.stop();
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }
}
