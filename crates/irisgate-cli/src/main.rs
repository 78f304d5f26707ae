use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use irisgate_core::{ConfigOverrides, LivenessConfig};
use irisgate_hw::Recording;
use tracing_subscriber::EnvFilter;

mod replay;

#[zbus::proxy(
    interface = "org.freedesktop.IrisGate1",
    default_service = "org.freedesktop.IrisGate1",
    default_path = "/org/freedesktop/IrisGate1"
)]
trait IrisGate {
    fn start(&self, settings_json: &str, camera_index: u32) -> zbus::Result<bool>;
    fn stop(&self) -> zbus::Result<String>;
    fn stats(&self) -> zbus::Result<String>;
    fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "irisgate", version, about = "IrisGate liveness detection")]
struct Cli {
    /// Talk to a daemon on the session bus instead of the system bus.
    #[arg(long, global = true)]
    session: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(clap::Args)]
struct Thresholds {
    /// Eye aspect ratio below which the eye counts as closed.
    #[arg(long)]
    ear_threshold: Option<f32>,
    /// Consecutive closed frames that make a blink.
    #[arg(long)]
    blink_frames: Option<u32>,
    /// Iris displacement in pixels that counts as a move.
    #[arg(long)]
    move_threshold: Option<f32>,
    /// Iris circularity deviation that counts as an edge event.
    #[arg(long)]
    edge_threshold: Option<f32>,
}

impl Thresholds {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            ear_threshold: self.ear_threshold,
            blink_frames_required: self.blink_frames,
            pupil_move_threshold: self.move_threshold,
            iris_edge_threshold: self.edge_threshold,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start a liveness session in the daemon
    Start {
        /// Camera index (defaults to the daemon's configured camera)
        #[arg(long)]
        camera: Option<u32>,
        #[command(flatten)]
        thresholds: Thresholds,
    },
    /// Stop the running session and print its final stats
    Stop,
    /// Print the current session stats
    Stats,
    /// Print daemon status
    Status,
    /// Run the detectors over a landmark recording without a daemon
    Replay {
        /// JSON-lines landmark recording
        file: PathBuf,
        #[command(flatten)]
        thresholds: Thresholds,
    },
}

async fn connect(session: bool) -> Result<IrisGateProxy<'static>> {
    let conn = if session {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    }
    .context("failed to connect to D-Bus")?;
    IrisGateProxy::new(&conn)
        .await
        .context("failed to create IrisGate proxy (is irisgated running?)")
}

fn print_json(raw: &str) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("daemon returned malformed JSON")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Start { camera, thresholds } => {
            let proxy = connect(cli.session).await?;
            let camera_index = match camera {
                Some(c) => c,
                None => {
                    let status: serde_json::Value = serde_json::from_str(&proxy.status().await?)
                        .context("daemon returned malformed status")?;
                    status["camera_index"]
                        .as_u64()
                        .and_then(|c| u32::try_from(c).ok())
                        .unwrap_or(0)
                }
            };
            let settings = serde_json::to_string(&thresholds.overrides())?;
            if proxy.start(&settings, camera_index).await? {
                println!("session started on camera {camera_index}");
            } else {
                println!("a session is already running");
            }
        }
        Commands::Stop => {
            let proxy = connect(cli.session).await?;
            print_json(&proxy.stop().await?)?;
        }
        Commands::Stats => {
            let proxy = connect(cli.session).await?;
            print_json(&proxy.stats().await?)?;
        }
        Commands::Status => {
            let proxy = connect(cli.session).await?;
            print_json(&proxy.status().await?)?;
        }
        Commands::Replay { file, thresholds } => {
            let recording = Recording::load(&file)
                .with_context(|| format!("failed to load {}", file.display()))?;
            let config = LivenessConfig::default().with_overrides(&thresholds.overrides());
            config.validate()?;
            tracing::info!(frames = recording.len(), "replaying recording");
            let stats = replay::replay(&recording, config);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
