//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RedactError, RedactResult};

/// Global application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Blur sizing parameters.
    pub blur: BlurConfig,

    /// External media tool settings.
    pub media: MediaConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Adaptive blur parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    /// Kernel size as a fraction of a region's larger bounding dimension.
    pub kernel_ratio: f64,

    /// Smallest kernel ever applied. Forced odd and at least 1.
    pub min_kernel: u32,

    /// Also skip regions the annotation marks as `outside` the frame.
    pub skip_outside: bool,
}

/// External decoder/encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// ffmpeg binary used for decoding and encoding.
    pub ffmpeg_bin: String,

    /// ffprobe binary used to read stream descriptors.
    pub ffprobe_bin: String,

    /// Output video encoder name (ffmpeg `-c:v`).
    pub video_codec: String,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "vidredact=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            kernel_ratio: 0.35,
            min_kernel: 1,
            skip_outside: false,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            // ffmpeg's encoder for the `mp4v` fourcc.
            video_codec: "mpeg4".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Ignoring config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Any failure is a configuration error.
    pub fn load_from(path: impl AsRef<Path>) -> RedactResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RedactError::config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            RedactError::config(format!("Failed to parse config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> RedactResult<()> {
        if !self.blur.kernel_ratio.is_finite() || self.blur.kernel_ratio <= 0.0 {
            return Err(RedactError::config(format!(
                "blur.kernel_ratio must be a positive number, got {}",
                self.blur.kernel_ratio
            )));
        }
        if self.media.video_codec.trim().is_empty() {
            return Err(RedactError::config("media.video_codec must not be empty"));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("vidredact").join("config.json")
}
