//! Saving processed outputs to a media library.

use std::path::{Path, PathBuf};

/// Library access granted to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryAuthorization {
    NotDetermined,
    Restricted,
    Denied,
    Authorized,
    /// Add-only access to a subset of the library.
    Limited,
}

impl LibraryAuthorization {
    /// Whether new items may be added.
    pub fn permits_adding(self) -> bool {
        matches!(self, Self::Authorized | Self::Limited)
    }
}

/// Result of a save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    PermissionDenied,
    Failed(String),
}

impl SaveOutcome {
    /// Message suitable for the preview screen.
    pub fn message(&self) -> String {
        match self {
            Self::Saved => "Saved to library".to_string(),
            Self::PermissionDenied => "Photo library permission denied".to_string(),
            Self::Failed(reason) => reason.clone(),
        }
    }
}

/// Destination for finished outputs.
#[async_trait::async_trait]
pub trait LibrarySaver: Send + Sync {
    /// Request add-only access, prompting if needed.
    async fn request_authorization(&self) -> LibraryAuthorization;

    /// Add the file at `path` to the library.
    async fn save(&self, path: &Path) -> Result<(), String>;
}

/// Library backed by a local directory. Saving copies the file in.
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    root: PathBuf,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait::async_trait]
impl LibrarySaver for DirectoryLibrary {
    async fn request_authorization(&self) -> LibraryAuthorization {
        match tokio::fs::create_dir_all(&self.root).await {
            Ok(()) => match tokio::fs::metadata(&self.root).await {
                Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => {
                    LibraryAuthorization::Authorized
                }
                Ok(_) => LibraryAuthorization::Denied,
                Err(e) => {
                    tracing::warn!(error = %e, root = %self.root.display(), "Library unreadable");
                    LibraryAuthorization::Restricted
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, root = %self.root.display(), "Library not writable");
                LibraryAuthorization::Denied
            }
        }
    }

    async fn save(&self, path: &Path) -> Result<(), String> {
        let name = path
            .file_name()
            .ok_or_else(|| format!("{} has no file name", path.display()))?;
        let target = self.root.join(name);
        tokio::fs::copy(path, &target)
            .await
            .map_err(|e| format!("Failed to save video: {e}"))?;
        tracing::info!(target = %target.display(), "Saved to library");
        Ok(())
    }
}
