use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default)]
    pub timelapse: TimelapseConfig,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(rename = "camera")]
    pub cameras: Vec<CameraConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelapseConfig {
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default = "default_gray_threshold")]
    pub gray_threshold: f64,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default)]
    pub roi: RoiConfig,
}

/// Region of interest for gray-frame detection, as fractions of the frame.
///
/// The default is the top-right quadrant, which suits the usual camera
/// mounting (the left and bottom halves are mostly sky and ground).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RoiConfig {
    #[serde(default = "default_roi_x_start")]
    pub x_start: f64,
    #[serde(default = "default_roi_x_end")]
    pub x_end: f64,
    #[serde(default = "default_roi_y_start")]
    pub y_start: f64,
    #[serde(default = "default_roi_y_end")]
    pub y_end: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Custom S3-compatible endpoint. Uses AWS when absent.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub bucket: String,
    #[serde(default = "default_storage_prefix")]
    pub prefix: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub name: String,
    pub drive_root: PathBuf,
    #[serde(default)]
    pub drive_path: PathBuf,
    #[serde(default)]
    pub skip_upload: bool,
    #[serde(default)]
    pub delete_on_success: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file, written in addition to stdout.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for TimelapseConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            gray_threshold: default_gray_threshold(),
            extension: default_extension(),
            codec: default_codec(),
            crf: default_crf(),
            preset: default_preset(),
            roi: RoiConfig::default(),
        }
    }
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            x_start: default_roi_x_start(),
            x_end: default_roi_x_end(),
            y_start: default_roi_y_start(),
            y_end: default_roi_y_end(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            wait_secs: default_wait_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timelapse;
        if !(t.fps.is_finite() && t.fps > 0.0) {
            return Err(ConfigError::Invalid(format!("fps must be positive, got {}", t.fps)));
        }
        if !(t.gray_threshold.is_finite() && t.gray_threshold >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "gray_threshold must be non-negative, got {}",
                t.gray_threshold
            )));
        }
        if t.extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::Invalid("extension must not be empty".into()));
        }
        if !matches!(t.codec.as_str(), "h264" | "h265") {
            return Err(ConfigError::Invalid(format!(
                "codec must be \"h264\" or \"h265\", got {:?}",
                t.codec
            )));
        }
        t.roi.validate()?;
        if self.cameras.is_empty() {
            return Err(ConfigError::Invalid("at least one [[camera]] is required".into()));
        }
        if self.cleanup.max_attempts == 0 {
            return Err(ConfigError::Invalid("cleanup.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Look up a camera by name.
    pub fn camera(&self, name: &str) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| c.name == name)
    }
}

impl TimelapseConfig {
    /// Extension without a leading dot, e.g. `jpg`.
    pub fn extension(&self) -> &str {
        self.extension.trim_start_matches('.')
    }
}

impl RoiConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if ![self.x_start, self.x_end, self.y_start, self.y_end]
            .into_iter()
            .all(in_unit)
        {
            return Err(ConfigError::Invalid(format!(
                "roi bounds must lie in [0, 1], got {:?}",
                self
            )));
        }
        if self.x_start >= self.x_end || self.y_start >= self.y_end {
            return Err(ConfigError::Invalid(format!("roi is empty: {:?}", self)));
        }
        Ok(())
    }

    /// Pixel rectangle `(x, y, width, height)` of this region in a
    /// `width` x `height` frame. Bounds are floored, so the default
    /// quadrant is `[w/2, w) x [0, h/2)` with integer division.
    pub fn pixel_rect(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let scale = |frac: f64, len: u32| ((frac * len as f64).floor() as u32).min(len);
        let x0 = scale(self.x_start, width);
        let x1 = scale(self.x_end, width);
        let y0 = scale(self.y_start, height);
        let y1 = scale(self.y_end, height);
        (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

impl CameraConfig {
    /// Directory on the network drive holding this camera's images for `date`.
    pub fn source_dir(&self, date: &str) -> PathBuf {
        self.drive_root
            .join(&self.drive_path)
            .join(&self.name)
            .join(date)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_fps() -> f64 {
    30.0
}
fn default_gray_threshold() -> f64 {
    0.05
}
fn default_extension() -> String {
    "jpg".into()
}
fn default_codec() -> String {
    "h264".into()
}
fn default_crf() -> u32 {
    23
}
fn default_preset() -> String {
    "medium".into()
}
fn default_roi_x_start() -> f64 {
    0.5
}
fn default_roi_x_end() -> f64 {
    1.0
}
fn default_roi_y_start() -> f64 {
    0.0
}
fn default_roi_y_end() -> f64 {
    0.5
}
fn default_storage_prefix() -> String {
    "timelapse/".into()
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_max_attempts() -> u32 {
    5
}
fn default_wait_secs() -> u64 {
    3
}
fn default_log_level() -> String {
    "info".into()
}
