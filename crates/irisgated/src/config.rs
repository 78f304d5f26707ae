use std::path::{Path, PathBuf};

use irisgate_core::{ConfigError, LivenessConfig};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Camera opened when a client does not name one.
    pub camera_index: u32,
    /// Directory holding `camera{N}.jsonl` landmark recordings.
    pub recordings_dir: PathBuf,
    /// Frame buffer capacity between capture and processing.
    pub frame_buffer: usize,
    /// Serial device that receives one byte per blink, if any. Terminals are
    /// set to 115200 raw on open; `stty -F <dev> 115200 raw -hupcl` is the
    /// equivalent when preparing the line by hand.
    pub notifier_port: Option<PathBuf>,
    /// Detector defaults; clients may override individual thresholds per session.
    pub liveness: LivenessConfig,
    /// Whether the daemon is running on the session bus (development mode).
    pub session_bus: bool,
}

impl Config {
    /// Load configuration from `IRISGATE_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigLoadError> {
        let data_dir = lookup("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("irisgate");

        let mut liveness = match lookup("IRISGATE_CONFIG") {
            Some(path) => load_liveness_file(Path::new(&path))?,
            None => LivenessConfig::default(),
        };
        liveness.ear_threshold = parsed(&lookup, "IRISGATE_EAR_THRESHOLD", liveness.ear_threshold);
        liveness.blink_frames_required =
            parsed(&lookup, "IRISGATE_BLINK_FRAMES", liveness.blink_frames_required);
        liveness.pupil_move_threshold =
            parsed(&lookup, "IRISGATE_MOVE_THRESHOLD", liveness.pupil_move_threshold);
        liveness.iris_edge_threshold =
            parsed(&lookup, "IRISGATE_EDGE_THRESHOLD", liveness.iris_edge_threshold);
        liveness.validate()?;

        Ok(Self {
            camera_index: parsed(&lookup, "IRISGATE_CAMERA_INDEX", 0),
            recordings_dir: lookup("IRISGATE_RECORDINGS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("recordings")),
            frame_buffer: parsed(&lookup, "IRISGATE_FRAME_BUFFER", 2usize).max(1),
            notifier_port: lookup("IRISGATE_NOTIFIER_PORT")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            liveness,
            session_bus: lookup("IRISGATE_SESSION_BUS").is_some(),
        })
    }
}

fn load_liveness_file(path: &Path) -> Result<LivenessConfig, ConfigLoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, "ignoring unparsable setting");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::from_lookup(lookup(&[("HOME", "/home/alice")])).unwrap();
        assert_eq!(cfg.camera_index, 0);
        assert_eq!(cfg.frame_buffer, 2);
        assert_eq!(
            cfg.recordings_dir,
            PathBuf::from("/home/alice/.local/share/irisgate/recordings")
        );
        assert!(cfg.notifier_port.is_none());
        assert!(!cfg.session_bus);
        assert_eq!(cfg.liveness, LivenessConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("IRISGATE_CAMERA_INDEX", "3"),
            ("IRISGATE_EAR_THRESHOLD", "0.25"),
            ("IRISGATE_BLINK_FRAMES", "4"),
            ("IRISGATE_NOTIFIER_PORT", "/dev/ttyUSB0"),
            ("IRISGATE_SESSION_BUS", "1"),
        ]))
        .unwrap();
        assert_eq!(cfg.camera_index, 3);
        assert!((cfg.liveness.ear_threshold - 0.25).abs() < 1e-6);
        assert_eq!(cfg.liveness.blink_frames_required, 4);
        assert_eq!(cfg.notifier_port, Some(PathBuf::from("/dev/ttyUSB0")));
        assert!(cfg.session_bus);
    }

    #[test]
    fn test_unparsable_value_falls_back() {
        let cfg = Config::from_lookup(lookup(&[("IRISGATE_CAMERA_INDEX", "front")])).unwrap();
        assert_eq!(cfg.camera_index, 0);
    }

    #[test]
    fn test_out_of_range_override_is_rejected() {
        let err = Config::from_lookup(lookup(&[("IRISGATE_EAR_THRESHOLD", "0.9")])).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Invalid(_)));
    }

    #[test]
    fn test_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "irisgated-config-test-{}.toml",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::write(
            &path,
            "ear_threshold = 0.19\nblink_cooldown_frames = 6\nedge_counting = \"rising_edge\"\n",
        )
        .unwrap();

        let path_str = path.to_string_lossy().into_owned();
        let cfg = Config::from_lookup(lookup(&[("IRISGATE_CONFIG", &path_str)])).unwrap();
        assert!((cfg.liveness.ear_threshold - 0.19).abs() < 1e-6);
        assert_eq!(cfg.liveness.blink_cooldown_frames, 6);
        assert_eq!(
            cfg.liveness.edge_counting,
            irisgate_core::CountingMode::RisingEdge
        );

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_toml_file() {
        let err = Config::from_lookup(lookup(&[("IRISGATE_CONFIG", "/nonexistent/irisgate.toml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::Read { .. }));
    }
}
