//! mmapcam runtime configuration handling

use crate::camera::{CameraConfig, ControlSetting, PixelFormat, Priority, WaitStrategy};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure persisted to disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MmapcamConfig {
    /// Camera capture configuration overrides
    pub camera: CameraOptions,
    /// Logging configuration
    pub logging: LoggingOptions,
}

impl MmapcamConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("Using configuration file: {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("No mmapcam.toml / mmapcam.yaml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Attempt to locate a configuration file in common locations.
    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        for candidate in ["mmapcam.toml", "mmapcam.yaml", "mmapcam.yml"] {
            let path = cwd.join(candidate);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        if let Some(xdg_config) = env::var_os("XDG_CONFIG_HOME") {
            let base = PathBuf::from(xdg_config).join("mmapcam");
            for candidate in ["config.toml", "config.yaml"] {
                let path = base.join(candidate);
                if path.exists() {
                    return Ok(Some(path));
                }
            }
        }

        Ok(None)
    }

    /// Read configuration from a concrete file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "toml" => toml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse TOML {}: {e}", path.display()))
            }),
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse YAML {}: {e}", path.display()))
            }),
            other => Err(Error::Config(format!(
                "Unsupported config format '{other}', expected toml/yaml"
            ))),
        }
    }

    /// Apply environment variable overrides after file/default loading.
    pub fn apply_env_overrides(&mut self) {
        self.camera.apply_env_overrides();
        self.logging.apply_env_overrides();
    }

    /// Produce a fully resolved camera configuration ready to open the device.
    pub fn camera_config(&self) -> Result<CameraConfig> {
        self.camera.to_camera_config()
    }
}

/// User-friendly camera overrides that are merged on top of `CameraConfig::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOptions {
    /// Override for the numeric camera index (`/dev/videoN`).
    pub device_index: Option<i32>,
    /// Override for desired frame width in pixels.
    pub width: Option<u32>,
    /// Override for desired frame height in pixels.
    pub height: Option<u32>,
    /// Override for pixel format string (mjpeg/uyvy/yuyv).
    pub format: Option<String>,
    /// Override for number of buffers to request.
    pub buffer_count: Option<u32>,
    /// Wait mode while no frame is ready (`spin` or `poll`).
    pub wait: Option<String>,
    /// Readiness wait bound in milliseconds when polling.
    pub poll_interval_ms: Option<u64>,
    /// Access priority (background/interactive/record).
    pub priority: Option<String>,
    /// Controls to apply after format negotiation.
    pub controls: Vec<ControlSetting>,
}

impl CameraOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(index) = env::var("MMAPCAM_CAMERA_INDEX") {
            if let Ok(parsed) = index.parse::<i32>() {
                self.device_index = Some(parsed);
            }
        }
        if let Ok(width) = env::var("MMAPCAM_CAMERA_WIDTH") {
            self.width = width.parse::<u32>().ok();
        }
        if let Ok(height) = env::var("MMAPCAM_CAMERA_HEIGHT") {
            self.height = height.parse::<u32>().ok();
        }
        if let Ok(format) = env::var("MMAPCAM_CAMERA_FORMAT") {
            self.format = Some(format);
        }
        if let Ok(buffers) = env::var("MMAPCAM_CAMERA_BUFFERS") {
            self.buffer_count = buffers.parse::<u32>().ok();
        }
        if let Ok(wait) = env::var("MMAPCAM_CAMERA_WAIT") {
            self.wait = Some(wait);
        }
        if let Ok(interval) = env::var("MMAPCAM_CAMERA_POLL_MS") {
            self.poll_interval_ms = interval.parse::<u64>().ok();
        }
        if let Ok(priority) = env::var("MMAPCAM_CAMERA_PRIORITY") {
            self.priority = Some(priority).filter(|p| !p.trim().is_empty());
        }
    }

    /// Merge overrides onto the default camera configuration.
    pub fn to_camera_config(&self) -> Result<CameraConfig> {
        let mut config = CameraConfig::default();

        if let Some(index) = self.device_index {
            config.device_index = index;
        }

        if let Some(width) = self.width {
            config.width = width;
        }

        if let Some(height) = self.height {
            config.height = height;
        }

        if let Some(format) = &self.format {
            config.format = PixelFormat::parse(format).ok_or_else(|| {
                Error::Config(format!(
                    "Unknown pixel format '{format}'. Use mjpeg, uyvy, or yuyv"
                ))
            })?;
        }

        if let Some(buffers) = self.buffer_count {
            config.buffer_count = buffers;
        }

        config.wait = match self.wait.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("poll") => WaitStrategy::Poll {
                interval_ms: self.poll_interval_ms.unwrap_or(100),
            },
            Some("spin") => WaitStrategy::Spin,
            Some(other) => {
                return Err(Error::Config(format!(
                    "Unknown wait mode '{other}'. Use spin or poll"
                )));
            }
        };

        if let Some(priority) = &self.priority {
            config.priority = Some(Priority::parse(priority).ok_or_else(|| {
                Error::Config(format!(
                    "Unknown priority '{priority}'. Use background, interactive, or record"
                ))
            })?);
        }

        config.controls = self.controls.clone();

        Ok(config)
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level or filter directive (overridable via `MMAPCAM_LOG`)
    pub level: String,
    /// Optional log file path for teeing structured logs
    pub file: Option<PathBuf>,
    /// Force ANSI colors in stderr logging
    pub color: bool,
    /// Optional log rotation strategy applied to `file`
    pub rotation: Option<LogRotation>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            color: true,
            rotation: None,
        }
    }
}

impl LoggingOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("MMAPCAM_LOG") {
            self.level = level;
        }
        if let Ok(file) = env::var("MMAPCAM_LOG_FILE") {
            self.file = Some(PathBuf::from(file)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Ok(color) = env::var("MMAPCAM_LOG_COLOR") {
            match color.to_ascii_lowercase().as_str() {
                "0" | "false" | "off" => self.color = false,
                "1" | "true" | "on" => self.color = true,
                _ => {}
            }
        }
        if let Ok(rotation) = env::var("MMAPCAM_LOG_ROTATION") {
            if let Some(parsed) = LogRotation::parse(&rotation) {
                self.rotation = Some(parsed);
            }
        }
    }
}

/// Supported log rotation policies for file sinks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate log files once per hour
    Hourly,
    /// Rotate log files once per day
    Daily,
}

impl LogRotation {
    /// Parse a rotation policy name (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}
