//! Single-session lifecycle: one capture thread, one worker thread.
//!
//! The worker owns every piece of detector state and is the only writer of
//! the published snapshot. Readers always see a whole record, either the one
//! before or the one after a frame. `stop` joins the worker, so once it
//! returns the snapshot is final.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use irisgate_core::{ConfigError, LivenessConfig, LivenessProcessor, LivenessStats};
use irisgate_hw::{CameraError, CaptureBackend, FrameSource, LandmarkProvider, Notifier};
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Published view of the current (or most recent) session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub session_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub camera_index: Option<u32>,
    pub running: bool,
    #[serde(flatten)]
    pub liveness: LivenessStats,
}

/// Read-only handle on the published snapshot. Reading it never waits for
/// the controller, so it stays responsive while a start or stop is joining
/// threads.
#[derive(Clone)]
pub struct StatsView {
    stats: Arc<RwLock<SessionStats>>,
}

impl StatsView {
    pub fn stats(&self) -> SessionStats {
        self.stats.read().clone()
    }

    /// Whether the published snapshot belongs to a live worker.
    pub fn is_running(&self) -> bool {
        self.stats.read().running
    }
}

struct ActiveSession {
    id: Uuid,
    running: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

/// Owns the worker thread of at most one running session.
pub struct SessionController {
    backend: Arc<dyn CaptureBackend>,
    frame_buffer: usize,
    stats: Arc<RwLock<SessionStats>>,
    active: Option<ActiveSession>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn CaptureBackend>, frame_buffer: usize) -> Self {
        Self {
            backend,
            frame_buffer,
            stats: Arc::new(RwLock::new(SessionStats::default())),
            active: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Start a session. Returns `Ok(false)` without side effects if one is
    /// already running. On error nothing is left running.
    pub fn start(
        &mut self,
        config: LivenessConfig,
        camera_index: u32,
        notifier: Arc<dyn Notifier>,
    ) -> Result<bool, SessionError> {
        if let Some(active) = &self.active {
            tracing::debug!(session = %active.id, "start ignored: session already running");
            return Ok(false);
        }

        config.validate()?;
        let processor = LivenessProcessor::new(config);
        let camera = self.backend.open(camera_index)?;
        let source = FrameSource::start(camera.device, self.frame_buffer)?;

        let id = Uuid::new_v4();
        let fresh = SessionStats {
            session_id: Some(id),
            started_at: Some(Utc::now()),
            camera_index: Some(camera_index),
            running: true,
            liveness: LivenessStats::default(),
        };
        let previous = std::mem::replace(&mut *self.stats.write(), fresh);

        let running = Arc::new(AtomicBool::new(true));
        let worker = Worker {
            id,
            source,
            landmarks: camera.landmarks,
            processor,
            notifier,
            stats: Arc::clone(&self.stats),
            running: Arc::clone(&running),
        };

        // If spawning fails the closure is dropped, and the frame source
        // with it, which stops the capture thread.
        let spawned = std::thread::Builder::new()
            .name("irisgate-worker".into())
            .spawn(move || worker.run());
        let handle = match spawned {
            Ok(h) => h,
            Err(e) => {
                *self.stats.write() = previous;
                return Err(SessionError::Spawn(e));
            }
        };

        tracing::info!(session = %id, camera_index, "session started");
        self.active = Some(ActiveSession {
            id,
            running,
            worker: handle,
        });
        Ok(true)
    }

    /// Stop the running session and return its final stats. Returns `None`
    /// if no session is running.
    pub fn stop(&mut self) -> Option<SessionStats> {
        let active = self.active.take()?;
        active.running.store(false, Ordering::Release);
        if active.worker.join().is_err() {
            tracing::error!(session = %active.id, "worker thread panicked");
            self.stats.write().running = false;
        }

        let stats = self.stats();
        tracing::info!(
            session = %active.id,
            blinks = stats.liveness.blinks,
            moves = stats.liveness.moves,
            edges = stats.liveness.edges,
            contraction = ?stats.liveness.contraction,
            lively = stats.liveness.lively,
            "session stopped"
        );
        Some(stats)
    }

    /// Current snapshot; after `stop`, the final one.
    pub fn stats(&self) -> SessionStats {
        self.stats.read().clone()
    }

    pub fn view(&self) -> StatsView {
        StatsView {
            stats: Arc::clone(&self.stats),
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    id: Uuid,
    source: FrameSource,
    landmarks: Box<dyn LandmarkProvider>,
    processor: LivenessProcessor,
    notifier: Arc<dyn Notifier>,
    stats: Arc<RwLock<SessionStats>>,
    running: Arc<AtomicBool>,
}

impl Worker {
    fn run(mut self) {
        tracing::debug!(session = %self.id, "worker thread started");
        while self.running.load(Ordering::Acquire) {
            // read() waits briefly, so an idle camera does not spin this loop
            let Some(frame) = self.source.read() else {
                continue;
            };
            let landmarks = self.landmarks.locate(&frame);
            let outcome = self.processor.process(landmarks.as_ref(), frame.captured_at);
            if outcome.blink {
                notify(self.notifier.as_ref());
            }
            self.publish(true);
        }

        self.source.stop();
        self.publish(false);
        tracing::debug!(
            session = %self.id,
            dropped_frames = self.source.dropped(),
            "worker thread exiting"
        );
    }

    fn publish(&self, running: bool) {
        let liveness = self.processor.stats();
        let mut stats = self.stats.write();
        stats.liveness = liveness;
        stats.running = running;
    }
}

/// Signal a blink. Failures, panics included, never reach the frame loop.
fn notify(notifier: &dyn Notifier) {
    match std::panic::catch_unwind(AssertUnwindSafe(|| notifier.signal())) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "blink notification failed"),
        Err(_) => tracing::warn!("blink notifier panicked"),
    }
}
