//! Preview session management.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use epicshot_common::cancel::{cancellation_pair, CancellationHandle};
use epicshot_common::clock::{SystemClock, WallClock};
use epicshot_common::config::AppConfig;
use epicshot_common::error::{EpicshotError, EpicshotResult, ErrorKind};
use epicshot_media_model::{OverlayText, PlacementPosition, ProcessedOutput, SourceClip};
use epicshot_render_engine::OverlayPipeline;

use crate::save::{LibrarySaver, SaveOutcome};
use crate::text::overlay_text;

/// What the preview screen should show.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingState {
    /// Nothing requested yet.
    Idle,
    /// A request is running; no output or error is visible.
    Processing,
    /// The newest request finished.
    Ready(ProcessedOutput),
    /// The newest request failed. Retry re-runs it.
    Failed(FailureReport),
}

impl ProcessingState {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed(_))
    }

    pub fn output(&self) -> Option<&ProcessedOutput> {
        match self {
            Self::Ready(output) => Some(output),
            _ => None,
        }
    }
}

/// User-facing description of a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub message: String,
    pub kind: ErrorKind,
    pub retryable: bool,
}

impl FailureReport {
    pub fn from_error(err: &EpicshotError) -> Self {
        Self {
            message: err.user_message(),
            kind: err.kind(),
            retryable: err.is_retryable(),
        }
    }
}

/// Session inputs that stay fixed for its lifetime.
#[derive(Clone)]
pub struct SessionConfig {
    pub source: SourceClip,
    /// Text placed before the timestamp.
    pub prefix: String,
    /// Selection used by `start`.
    pub initial_position: PlacementPosition,
}

impl SessionConfig {
    pub fn new(source: SourceClip, app: &AppConfig) -> Self {
        Self {
            source,
            prefix: app.overlay.prefix.clone(),
            initial_position: PlacementPosition::default(),
        }
    }
}

struct RequestSlot {
    generation: u64,
    position: PlacementPosition,
    cancel: Option<CancellationHandle>,
}

struct Shared {
    state_tx: watch::Sender<ProcessingState>,
    slot: Mutex<RequestSlot>,
}

impl Shared {
    /// Publish a finished request if it is still the newest one.
    ///
    /// Output of a superseded request is deleted after the slot lock is
    /// released.
    async fn finish(&self, generation: u64, result: EpicshotResult<ProcessedOutput>) {
        let superseded = {
            let mut slot = self.slot.lock().await;
            if slot.generation == generation {
                slot.cancel = None;
                self.state_tx.send_replace(settled_state(generation, result));
                return;
            }
            result.ok()
        };
        if let Some(output) = superseded {
            tracing::debug!(
                generation,
                output = %output.path().display(),
                "Discarding output of superseded request"
            );
            discard(output).await;
        }
    }
}

fn settled_state(generation: u64, result: EpicshotResult<ProcessedOutput>) -> ProcessingState {
    match result {
        Ok(output) => {
            tracing::info!(
                generation,
                output = %output.path().display(),
                "Processed clip ready"
            );
            ProcessingState::Ready(output)
        }
        Err(err) if err.is_silent() => {
            tracing::debug!(generation, "Request cancelled");
            ProcessingState::Idle
        }
        Err(err) => {
            tracing::warn!(generation, error = %err, "Processing failed");
            ProcessingState::Failed(FailureReport::from_error(&err))
        }
    }
}

/// Delete an output file that will never be shown. Missing files are fine.
async fn discard(output: ProcessedOutput) {
    match tokio::fs::remove_file(output.path()).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(error = %e, output = %output.path().display(), "Failed to delete output")
        }
    }
}

/// One recorded clip on the preview screen.
///
/// Every trigger cancels the request in flight and starts a new one; only
/// the newest request publishes state.
pub struct PreviewSession {
    pipeline: OverlayPipeline,
    config: SessionConfig,
    clock: Arc<dyn WallClock>,
    shared: Arc<Shared>,
}

impl PreviewSession {
    pub fn new(pipeline: OverlayPipeline, config: SessionConfig) -> Self {
        Self::with_clock(pipeline, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        pipeline: OverlayPipeline,
        config: SessionConfig,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ProcessingState::Idle);
        let slot = RequestSlot {
            generation: 0,
            position: config.initial_position,
            cancel: None,
        };
        Self {
            pipeline,
            config,
            clock,
            shared: Arc::new(Shared {
                state_tx,
                slot: Mutex::new(slot),
            }),
        }
    }

    /// Process the clip with the current position.
    pub async fn start(&self) -> u64 {
        let position = self.position().await;
        self.launch(position).await
    }

    /// Change the overlay position and reprocess.
    pub async fn set_position(&self, position: PlacementPosition) -> u64 {
        self.launch(position).await
    }

    /// Re-run the pipeline with the same clip and position.
    pub async fn retry(&self) -> u64 {
        let position = self.position().await;
        tracing::info!(%position, "Retrying processing");
        self.launch(position).await
    }

    pub async fn position(&self) -> PlacementPosition {
        self.shared.slot.lock().await.position
    }

    /// Snapshot of the published state.
    pub fn state(&self) -> ProcessingState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessingState> {
        self.shared.state_tx.subscribe()
    }

    /// Wait until the newest request is ready or failed.
    pub async fn settled(&self) -> ProcessingState {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(ProcessingState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    /// Save the current output to `saver`.
    pub async fn save_to_library(&self, saver: &dyn LibrarySaver) -> SaveOutcome {
        let Some(output) = self.state().output().cloned() else {
            return SaveOutcome::Failed("Nothing to save".to_string());
        };

        let authorization = saver.request_authorization().await;
        if !authorization.permits_adding() {
            tracing::info!(?authorization, "Library access not granted");
            return SaveOutcome::PermissionDenied;
        }

        match saver.save(output.path()).await {
            Ok(()) => SaveOutcome::Saved,
            Err(reason) => {
                tracing::warn!(%reason, output = %output.path().display(), "Save failed");
                SaveOutcome::Failed(reason)
            }
        }
    }

    async fn launch(&self, position: PlacementPosition) -> u64 {
        let (generation, replaced) = {
            let mut slot = self.shared.slot.lock().await;
            if let Some(previous) = slot.cancel.take() {
                previous.cancel();
            }
            slot.generation += 1;
            slot.position = position;
            let generation = slot.generation;

            let (handle, signal) = cancellation_pair();
            slot.cancel = Some(handle);
            let replaced = self.shared.state_tx.send_replace(ProcessingState::Processing);

            let text = OverlayText::new(
                overlay_text(&self.config.prefix, self.clock.as_ref()),
                position,
            );
            tracing::info!(generation, %position, text = %text.content, "Starting request");

            let pipeline = self.pipeline.clone();
            let source = self.config.source.clone();
            let shared = self.shared.clone();
            tokio::spawn(async move {
                let result = pipeline.run(&source, &text, None, signal).await;
                shared.finish(generation, result).await;
            });
            (generation, replaced)
        };

        if let ProcessingState::Ready(output) = replaced {
            discard(output).await;
        }
        generation
    }
}

impl Drop for PreviewSession {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.shared.slot.try_lock() {
            if let Some(handle) = slot.cancel.take() {
                handle.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_report_uses_user_message() {
        let report = FailureReport::from_error(&EpicshotError::export_failed("exit 1"));
        assert_eq!(report.message, "Video export failed");
        assert_eq!(report.kind, ErrorKind::ExportFailed);
        assert!(report.retryable);

        let report = FailureReport::from_error(&EpicshotError::no_video_track("/a.m4a"));
        assert_eq!(report.message, "No video track found");
        assert!(!report.retryable);
    }

    #[tokio::test]
    async fn test_discard_removes_file_and_tolerates_missing() {
        let path = std::env::temp_dir().join(format!("epicshot-{}.mov", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"encoded").unwrap();
        let output = || {
            ProcessedOutput::new(
                path.clone(),
                epicshot_media_model::MediaTime::new(10, 1),
                epicshot_media_model::RenderSize {
                    width: 1080,
                    height: 1920,
                },
                epicshot_media_model::ContainerFormat::Mov,
            )
        };

        discard(output()).await;
        assert!(!path.exists());
        discard(output()).await;
    }

    #[test]
    fn test_only_terminal_states_are_settled() {
        assert!(!ProcessingState::Idle.is_settled());
        assert!(!ProcessingState::Processing.is_settled());
        assert!(ProcessingState::Failed(FailureReport {
            message: "Video export failed".to_string(),
            kind: ErrorKind::ExportFailed,
            retryable: true,
        })
        .is_settled());
    }
}
