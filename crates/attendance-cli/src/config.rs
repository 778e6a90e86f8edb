use attendance_core::detector::SCRFD_MODEL_FILE;
use attendance_core::encoder::ARCFACE_MODEL_FILE;
use attendance_core::DuplicateScope;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Runtime configuration: defaults, then an optional TOML file, then
/// `ATTENDANCE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Attendance ledger (default: attendance.csv in the working directory).
    pub ledger_path: PathBuf,
    /// Directory receiving captured face images.
    pub images_dir: PathBuf,
    /// Frames discarded after opening the camera while exposure settles.
    pub warmup_frames: usize,
    /// Whether a name seen on an earlier day blocks today's mark.
    pub duplicate_scope: DuplicateScope,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            model_dir: attendance_core::default_model_dir(),
            ledger_path: PathBuf::from("attendance.csv"),
            images_dir: PathBuf::from("images"),
            warmup_frames: 4,
            duplicate_scope: DuplicateScope::AnyDate,
        }
    }
}

impl Config {
    /// Load from `path` (or `ATTENDANCE_CONFIG`) if given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("ATTENDANCE_CONFIG").map(PathBuf::from));

        let mut config = match file {
            Some(path) => {
                let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                let config = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?;
                tracing::debug!(path = %path.display(), "loaded config file");
                config
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Override fields from `ATTENDANCE_*` variables. Unparseable values are
    /// logged and ignored.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ATTENDANCE_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("ATTENDANCE_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ATTENDANCE_LEDGER_PATH") {
            self.ledger_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("ATTENDANCE_IMAGES_DIR") {
            self.images_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ATTENDANCE_WARMUP_FRAMES") {
            match v.parse() {
                Ok(n) => self.warmup_frames = n,
                Err(e) => tracing::warn!(value = %v, error = %e, "ignoring ATTENDANCE_WARMUP_FRAMES"),
            }
        }
        if let Some(v) = lookup("ATTENDANCE_DUPLICATE_SCOPE") {
            match v.parse() {
                Ok(scope) => self.duplicate_scope = scope,
                Err(e) => tracing::warn!(value = %v, error = %e, "ignoring ATTENDANCE_DUPLICATE_SCOPE"),
            }
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> PathBuf {
        self.model_dir.join(SCRFD_MODEL_FILE)
    }

    /// Path to the ArcFace encoding model.
    pub fn encoder_model_path(&self) -> PathBuf {
        self.model_dir.join(ARCFACE_MODEL_FILE)
    }
}
