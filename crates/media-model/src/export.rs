//! Export settings and processed outputs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use epicshot_common::config::ExportDefaults;
use epicshot_common::error::{EpicshotError, EpicshotResult};

use crate::geometry::RenderSize;
use crate::time::MediaTime;

/// Encoder quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    Highest,
    High,
    Medium,
}

impl QualityPreset {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "highest" | "highest_quality" => Some(Self::Highest),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            _ => None,
        }
    }
}

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    Mov,
    Mp4,
}

impl ContainerFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mov" | "quicktime" => Some(Self::Mov),
            "mp4" => Some(Self::Mp4),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mov => "mov",
            Self::Mp4 => "mp4",
        }
    }
}

/// Validated export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub output_dir: PathBuf,
    pub container: ContainerFormat,
    pub quality: QualityPreset,
    pub frame_rate: u32,
    pub optimize_for_streaming: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir(),
            container: ContainerFormat::Mov,
            quality: QualityPreset::Highest,
            frame_rate: 30,
            optimize_for_streaming: true,
        }
    }
}

impl ExportSettings {
    /// Validate loosely-typed configuration.
    pub fn from_defaults(defaults: &ExportDefaults) -> EpicshotResult<Self> {
        let container = ContainerFormat::parse(&defaults.container).ok_or_else(|| {
            EpicshotError::config(format!(
                "Unknown container: {}. Use: mov, mp4",
                defaults.container
            ))
        })?;
        let quality = QualityPreset::parse(&defaults.quality).ok_or_else(|| {
            EpicshotError::config(format!(
                "Unknown quality preset: {}. Use: highest, high, medium",
                defaults.quality
            ))
        })?;
        if defaults.frame_rate == 0 {
            return Err(EpicshotError::config("frame_rate must be positive"));
        }

        Ok(Self {
            output_dir: defaults.output_dir(),
            container,
            quality,
            frame_rate: defaults.frame_rate,
            optimize_for_streaming: defaults.optimize_for_streaming,
        })
    }

    /// Duration of one output frame.
    pub fn frame_duration(&self) -> MediaTime {
        MediaTime::new(1, self.frame_rate.max(1) as i32)
    }
}

/// A finished export, independent of the source clip.
///
/// Handed to the caller, who decides whether to keep, save, or discard it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedOutput {
    path: PathBuf,
    pub duration: MediaTime,
    pub render_size: RenderSize,
    pub container: ContainerFormat,
}

impl ProcessedOutput {
    pub fn new(
        path: PathBuf,
        duration: MediaTime,
        render_size: RenderSize,
        container: ContainerFormat,
    ) -> Self {
        Self {
            path,
            duration,
            render_size,
            container,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
