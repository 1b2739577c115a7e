//! Error types shared across EpicShot crates.

use std::path::PathBuf;

/// Top-level error type for overlay processing.
///
/// The first four variants are the pipeline's terminal outcomes; the rest
/// are ambient failures (missing files, tooling, configuration) that the
/// orchestrator reports the same way.
#[derive(Debug, thiserror::Error)]
pub enum EpicshotError {
    #[error("No video track found in {path}")]
    NoVideoTrack { path: PathBuf },

    #[error("Cannot create export session: {message}")]
    CannotCreateExportSession { message: String },

    #[error("Video export failed: {message}")]
    ExportFailed { message: String },

    #[error("Export cancelled")]
    Cancelled,

    #[error("Probe error: {message}")]
    Probe { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using EpicshotError.
pub type EpicshotResult<T> = Result<T, EpicshotError>;

/// Coarse classification used when reporting failures to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoVideoTrack,
    CannotCreateExportSession,
    ExportFailed,
    Cancelled,
    Input,
    Internal,
}

impl EpicshotError {
    pub fn no_video_track(path: impl Into<PathBuf>) -> Self {
        Self::NoVideoTrack { path: path.into() }
    }

    pub fn cannot_create_export_session(msg: impl Into<String>) -> Self {
        Self::CannotCreateExportSession {
            message: msg.into(),
        }
    }

    pub fn export_failed(msg: impl Into<String>) -> Self {
        Self::ExportFailed {
            message: msg.into(),
        }
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoVideoTrack { .. } => ErrorKind::NoVideoTrack,
            Self::CannotCreateExportSession { .. } => ErrorKind::CannotCreateExportSession,
            Self::ExportFailed { .. } | Self::Io(_) => ErrorKind::ExportFailed,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Probe { .. } | Self::FileNotFound { .. } => ErrorKind::Input,
            Self::Config { .. } | Self::Json(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Whether an identical retry has a reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExportFailed { .. }
                | Self::CannotCreateExportSession { .. }
                | Self::Io(_)
                | Self::Probe { .. }
        )
    }

    /// Silent errors are never surfaced to the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short human-readable message for the preview screen.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoVideoTrack { .. } => "No video track found".to_string(),
            Self::CannotCreateExportSession { .. } => "Cannot create export session".to_string(),
            Self::ExportFailed { .. } | Self::Io(_) => "Video export failed".to_string(),
            Self::Cancelled => "Export cancelled".to_string(),
            Self::FileNotFound { .. } => "Recorded video is no longer available".to_string(),
            Self::Probe { .. } => "Could not read the recorded video".to_string(),
            Self::Config { .. } | Self::Json(_) | Self::Other(_) => {
                "Video processing failed".to_string()
            }
        }
    }
}
