use std::sync::Arc;

use anyhow::{Context, Result};
use irisgate_hw::{NoopNotifier, Notifier, RecordingBackend, SerialNotifier};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod session;

use config::Config;
use dbus_interface::{AppState, IrisGateService};
use session::SessionController;

const BUS_NAME: &str = "org.freedesktop.IrisGate1";
const OBJECT_PATH: &str = "/org/freedesktop/IrisGate1";

fn open_notifier(config: &Config) -> Arc<dyn Notifier> {
    let Some(port) = &config.notifier_port else {
        return Arc::new(NoopNotifier);
    };
    match SerialNotifier::open(port) {
        Ok(n) => Arc::new(n),
        Err(e) => {
            tracing::warn!(error = %e, "blink notifier unavailable, continuing without it");
            Arc::new(NoopNotifier)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("irisgated starting");

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!(
        camera_index = config.camera_index,
        recordings_dir = %config.recordings_dir.display(),
        frame_buffer = config.frame_buffer,
        session_bus = config.session_bus,
        "configuration loaded"
    );

    let backend = Arc::new(RecordingBackend::new(config.recordings_dir.clone()));
    let controller = SessionController::new(backend, config.frame_buffer);
    let notifier = open_notifier(&config);
    let session_bus = config.session_bus;

    let view = controller.view();
    let state = Arc::new(AppState {
        config,
        controller: Mutex::new(controller),
        view,
        notifier,
    });
    let service = IrisGateService {
        state: Arc::clone(&state),
    };

    let builder = if session_bus {
        zbus::connection::Builder::session()?
    } else {
        zbus::connection::Builder::system()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .with_context(|| format!("failed to acquire bus name {BUS_NAME}"))?;

    tracing::info!(bus = if session_bus { "session" } else { "system" }, "irisgated ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("irisgated shutting down");

    let final_stats = tokio::task::spawn_blocking(move || state.controller.lock().stop()).await?;
    if let Some(stats) = final_stats {
        tracing::info!(
            session = ?stats.session_id,
            blinks = stats.liveness.blinks,
            lively = stats.liveness.lively,
            "session stopped on shutdown"
        );
    }

    Ok(())
}
