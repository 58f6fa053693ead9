//! qscan runtime configuration handling

#[cfg(feature = "camera")]
use crate::camera::{CameraConfig, PixelFormat};
use crate::decoder::DecoderMode;
use crate::error::{Error, Result};
use crate::notify::ToastPosition;
use crate::session::{ScanPolicy, SessionSettings};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration structure loaded from disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QscanConfig {
    /// Camera capture configuration overrides
    pub camera: CameraOptions,
    /// Scan session behaviour
    pub session: SessionOptions,
    /// Sound and toast feedback
    pub notify: NotifyOptions,
    /// Logging configuration
    pub logging: LoggingOptions,
}

impl QscanConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("Using configuration file: {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("No qscan.toml / qscan.yaml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Attempt to locate a configuration file in common locations.
    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        for candidate in ["qscan.toml", "qscan.yaml", "qscan.yml"] {
            let path = cwd.join(candidate);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        if let Some(xdg_config) = env::var_os("XDG_CONFIG_HOME") {
            let base = PathBuf::from(xdg_config).join("qscan");
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
                "Unsupported config format '{}', expected toml/yaml",
                other
            ))),
        }
    }

    fn apply_env_overrides(&mut self) {
        self.camera.apply_env_overrides();
        self.session.apply_env_overrides();
        self.notify.apply_env_overrides();
        self.logging.apply_env_overrides();
    }

    /// Produce a fully resolved camera configuration ready to open the V4L2 device.
    #[cfg(feature = "camera")]
    pub fn camera_config(&self) -> Result<CameraConfig> {
        self.camera.to_camera_config()
    }
}

/// User-friendly camera overrides merged on top of the default camera configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOptions {
    /// Numeric camera index (e.g. `/dev/video2`).
    pub device_index: Option<usize>,
    /// Camera name substring match.
    pub device_name: Option<String>,
    /// Frame width in pixels.
    pub width: Option<u32>,
    /// Frame height in pixels.
    pub height: Option<u32>,
    /// Frames per second.
    pub fps: Option<u32>,
    /// Pixel format string (mjpeg/yuyv/rgb24).
    pub format: Option<String>,
    /// Number of V4L2 buffers to allocate.
    pub buffer_count: Option<u32>,
}

impl CameraOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(name) = env::var("QSCAN_CAMERA_DEVICE") {
            self.device_name = Some(name);
            self.device_index = None;
        }
        if let Ok(index) = env::var("QSCAN_CAMERA_INDEX") {
            if let Ok(parsed) = index.parse::<usize>() {
                self.device_index = Some(parsed);
                self.device_name = None;
            }
        }
        if let Ok(width) = env::var("QSCAN_CAMERA_WIDTH") {
            self.width = width.parse::<u32>().ok();
        }
        if let Ok(height) = env::var("QSCAN_CAMERA_HEIGHT") {
            self.height = height.parse::<u32>().ok();
        }
        if let Ok(fps) = env::var("QSCAN_CAMERA_FPS") {
            self.fps = fps.parse::<u32>().ok();
        }
        if let Ok(format) = env::var("QSCAN_CAMERA_FORMAT") {
            self.format = Some(format);
        }
    }

    /// Merge overrides onto the default camera configuration.
    #[cfg(feature = "camera")]
    pub fn to_camera_config(&self) -> Result<CameraConfig> {
        let mut config = CameraConfig::default();

        match (&self.device_name, self.device_index) {
            (Some(name), _) => config.device_name = Some(name.clone()),
            (None, Some(index)) => config.device_index = Some(index),
            (None, None) => {}
        }

        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(fps) = self.fps {
            config.fps = fps.max(1);
        }
        if let Some(format) = &self.format {
            config.format = PixelFormat::parse(format).ok_or_else(|| {
                Error::Config(format!(
                    "Unknown pixel format '{}'. Use mjpeg, yuyv, or rgb24",
                    format
                ))
            })?;
        }
        if let Some(buffers) = self.buffer_count {
            config.buffer_count = buffers.max(2);
        }

        Ok(config)
    }
}

/// Longest accepted session timeout (one day)
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Scan session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// What to do after a successful decode
    pub policy: ScanPolicy,
    /// Seconds before an active session is stopped automatically
    pub timeout_secs: u64,
    /// How frames are pulled from the source
    pub decoder: DecoderMode,
    /// Interval between decode attempts for the polling decoder
    pub poll_interval_ms: u64,
    /// Pause after a frame without a code for the stream decoder
    pub idle_backoff_ms: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            policy: ScanPolicy::StopOnFirstMatch,
            timeout_secs: 60,
            decoder: DecoderMode::Stream,
            poll_interval_ms: 1500,
            idle_backoff_ms: 90,
        }
    }
}

impl SessionOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(policy) = env::var("QSCAN_POLICY") {
            if let Some(parsed) = ScanPolicy::parse(&policy) {
                self.policy = parsed;
            }
        }
        if let Ok(timeout) = env::var("QSCAN_TIMEOUT_SECS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.timeout_secs = value;
            }
        }
        if let Ok(mode) = env::var("QSCAN_DECODER") {
            if let Some(parsed) = DecoderMode::parse(&mode) {
                self.decoder = parsed;
            }
        }
        if let Ok(interval) = env::var("QSCAN_POLL_INTERVAL_MS") {
            if let Ok(value) = interval.parse::<u64>() {
                self.poll_interval_ms = value;
            }
        }
    }

    /// Session controller settings derived from these options.
    pub fn settings(&self) -> Result<SessionSettings> {
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "session timeout must be at least one second".to_string(),
            ));
        }
        if self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(Error::Config(format!(
                "session timeout of {} seconds exceeds the {MAX_TIMEOUT_SECS} second limit",
                self.timeout_secs
            )));
        }
        Ok(SessionSettings {
            policy: self.policy,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }

    /// Polling interval, clamped so the polling decoder never spins.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    /// Backoff after an empty frame in the stream decoder.
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

/// Sound and toast feedback options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyOptions {
    /// Play an audible cue on every successful decode
    pub sound: bool,
    /// Sound file played instead of the built-in cue (requires the `audio` feature)
    pub sound_file: Option<PathBuf>,
    /// Seconds a toast stays on screen
    pub toast_secs: u64,
    /// Screen corner toasts are stacked in
    pub toast_position: ToastPosition,
    /// Maximum number of toasts shown at once
    pub max_toasts: usize,
}

impl Default for NotifyOptions {
    fn default() -> Self {
        Self {
            sound: true,
            sound_file: None,
            toast_secs: 2,
            toast_position: ToastPosition::TopRight,
            max_toasts: 3,
        }
    }
}

impl NotifyOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(sound) = env::var("QSCAN_SOUND") {
            match sound.to_ascii_lowercase().as_str() {
                "0" | "false" | "off" => self.sound = false,
                "1" | "true" | "on" => self.sound = true,
                _ => {}
            }
        }
        if let Ok(file) = env::var("QSCAN_SOUND_FILE") {
            self.sound_file = Some(PathBuf::from(file));
        }
        if let Ok(position) = env::var("QSCAN_TOAST_POSITION") {
            if let Some(parsed) = ToastPosition::parse(&position) {
                self.toast_position = parsed;
            }
        }
    }

    /// How long a toast stays visible.
    pub fn toast_ttl(&self) -> Duration {
        Duration::from_secs(self.toast_secs.max(1))
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level (overridable via `QSCAN_LOG_LEVEL`)
    pub level: String,
    /// Optional log file path for teeing structured logs
    pub file: Option<PathBuf>,
    /// Force ANSI colors in stdout logging
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
        if let Ok(level) = env::var("QSCAN_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(file) = env::var("QSCAN_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Ok(color) = env::var("QSCAN_LOG_COLOR") {
            match color.to_ascii_lowercase().as_str() {
                "0" | "false" | "off" => self.color = false,
                "1" | "true" | "on" => self.color = true,
                _ => {}
            }
        }
        if let Ok(rotation) = env::var("QSCAN_LOG_ROTATION") {
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
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}
