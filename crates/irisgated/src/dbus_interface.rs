use std::sync::Arc;

use irisgate_core::ConfigOverrides;
use irisgate_hw::Notifier;
use parking_lot::Mutex;
use zbus::interface;

use crate::config::Config;
use crate::session::{SessionController, SessionStats, StatsView};

/// Shared state accessible by D-Bus method handlers.
pub struct AppState {
    pub config: Config,
    /// Held across start and stop, which join threads. Readers use `view`.
    pub controller: Mutex<SessionController>,
    pub view: StatsView,
    pub notifier: Arc<dyn Notifier>,
}

/// D-Bus interface for the IrisGate liveness daemon.
///
/// Bus name: org.freedesktop.IrisGate1
/// Object path: /org/freedesktop/IrisGate1
pub struct IrisGateService {
    pub state: Arc<AppState>,
}

/// Parse the per-session settings a client sends with `Start`. An empty or
/// blank string means "daemon defaults".
fn parse_settings(settings_json: &str) -> Result<ConfigOverrides, serde_json::Error> {
    if settings_json.trim().is_empty() {
        return Ok(ConfigOverrides::default());
    }
    serde_json::from_str(settings_json)
}

fn stats_json(stats: &SessionStats) -> zbus::fdo::Result<String> {
    serde_json::to_string(stats).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}

/// Run a controller call on the blocking pool; start and stop join threads.
async fn with_controller<T, F>(state: &Arc<AppState>, f: F) -> zbus::fdo::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&AppState, &mut SessionController) -> T + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let mut controller = state.controller.lock();
        f(&state, &mut controller)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "controller task failed");
        zbus::fdo::Error::Failed(e.to_string())
    })
}

#[interface(name = "org.freedesktop.IrisGate1")]
impl IrisGateService {
    /// Start a liveness session on the given camera.
    ///
    /// Returns false if a session is already running.
    async fn start(&self, settings_json: &str, camera_index: u32) -> zbus::fdo::Result<bool> {
        tracing::info!(camera_index, "start requested");

        let overrides = parse_settings(settings_json).map_err(|e| {
            tracing::warn!(error = %e, "start: invalid settings");
            zbus::fdo::Error::InvalidArgs(e.to_string())
        })?;

        let started = with_controller(&self.state, move |state, controller| {
            let config = state.config.liveness.with_overrides(&overrides);
            controller.start(config, camera_index, Arc::clone(&state.notifier))
        })
        .await?
        .map_err(|e| {
            tracing::error!(error = %e, camera_index, "start failed");
            zbus::fdo::Error::Failed(e.to_string())
        })?;

        if !started {
            tracing::warn!("start: session already running");
        }
        Ok(started)
    }

    /// Stop the running session and return its final stats as JSON. When no
    /// session is running, returns the current snapshot.
    async fn stop(&self) -> zbus::fdo::Result<String> {
        tracing::info!("stop requested");
        let stats = with_controller(&self.state, |_, controller| {
            if !controller.is_running() {
                tracing::debug!("stop: no session running");
                return controller.stats();
            }
            controller.stop().unwrap_or_else(|| controller.stats())
        })
        .await?;
        stats_json(&stats)
    }

    /// Return the current liveness snapshot as JSON.
    async fn stats(&self) -> zbus::fdo::Result<String> {
        stats_json(&self.state.view.stats())
    }

    /// Return daemon status information as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let running = self.state.view.is_running();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "running": running,
            "camera_index": self.state.config.camera_index,
            "recordings_dir": self.state.config.recordings_dir,
            "notifier": self.state.config.notifier_port,
        })
        .to_string())
    }
}
