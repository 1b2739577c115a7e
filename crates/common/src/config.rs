//! Application configuration.
//!
//! The pipeline never writes configuration. An embedding application may
//! hand it a JSON file; anything missing falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Export defaults.
    pub export: ExportDefaults,

    /// Overlay appearance defaults.
    pub overlay: OverlayDefaults,

    /// External tool locations.
    pub tools: ToolPaths,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Directory for processed outputs. `None` means the system temp dir.
    pub output_dir: Option<PathBuf>,

    /// Output container ("mov" or "mp4").
    pub container: String,

    /// Quality preset ("highest", "high", "medium").
    pub quality: String,

    /// Render frame rate.
    pub frame_rate: u32,

    /// Move the index to the front of the file for streamed playback.
    pub optimize_for_streaming: bool,
}

/// Overlay appearance parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayDefaults {
    /// Fixed text placed before the timestamp.
    pub prefix: String,

    /// Font family resolved through fontconfig by the encoder.
    pub font_family: String,

    /// Foreground color (encoder color syntax).
    pub color: String,
}

/// Locations of the external media tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "epicshot=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            output_dir: None,
            container: "mov".to_string(),
            quality: "highest".to_string(),
            frame_rate: 30,
            optimize_for_streaming: true,
        }
    }
}

impl Default for OverlayDefaults {
    fn default() -> Self {
        Self {
            prefix: "EpicShot Demo".to_string(),
            font_family: "Sans".to_string(),
            color: "red".to_string(),
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
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

impl ExportDefaults {
    /// Resolved output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl AppConfig {
    /// Load config from a JSON file, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_json(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse config at {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent fields take their defaults.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}
