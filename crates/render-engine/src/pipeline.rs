//! One processing request: build, lay out the overlay, export.

use std::sync::Arc;

use epicshot_common::cancel::CancellationSignal;
use epicshot_common::config::AppConfig;
use epicshot_common::error::{EpicshotError, EpicshotResult};
use epicshot_media_model::{ExportSettings, OverlayText, ProcessedOutput, SourceClip};

use crate::builder::CompositionBuilder;
use crate::compositor::build_render_instruction;
use crate::export::{ExportSession, FfmpegBackend, ProgressCallback, TranscodeBackend};
use crate::overlay::OverlayRenderer;
use crate::probe::{FfprobeProbe, MediaProbe};

/// Composition builder, overlay renderer, and export session run in order.
///
/// Holds no per-request state; each [`run`](Self::run) owns its own
/// composition and render instruction.
#[derive(Clone)]
pub struct OverlayPipeline {
    builder: CompositionBuilder,
    renderer: OverlayRenderer,
    export: ExportSession,
}

impl OverlayPipeline {
    pub fn new(
        probe: Arc<dyn MediaProbe>,
        backend: Arc<dyn TranscodeBackend>,
        renderer: OverlayRenderer,
        settings: ExportSettings,
    ) -> Self {
        Self {
            builder: CompositionBuilder::new(probe),
            renderer,
            export: ExportSession::new(backend, settings),
        }
    }

    /// ffprobe/ffmpeg pipeline configured from `config`.
    pub fn from_config(config: &AppConfig) -> EpicshotResult<Self> {
        let settings = ExportSettings::from_defaults(&config.export)?;
        Ok(Self::new(
            Arc::new(FfprobeProbe::new(&config.tools.ffprobe)),
            Arc::new(FfmpegBackend::new(&config.tools.ffmpeg)),
            OverlayRenderer::new(&config.overlay),
            settings,
        ))
    }

    pub fn export_settings(&self) -> &ExportSettings {
        self.export.settings()
    }

    /// Produce a new output file with `text` burned in over `source`.
    pub async fn run(
        &self,
        source: &SourceClip,
        text: &OverlayText,
        progress: Option<ProgressCallback>,
        cancel: CancellationSignal,
    ) -> EpicshotResult<ProcessedOutput> {
        tracing::info!(
            source = %source.path().display(),
            position = %text.position,
            "Processing clip"
        );

        if cancel.is_cancelled() {
            return Err(EpicshotError::Cancelled);
        }

        let mut waiter = cancel.clone();
        let built = tokio::select! {
            _ = waiter.cancelled() => return Err(EpicshotError::Cancelled),
            built = self.builder.build(source) => built?,
        };

        let overlay = self.renderer.make_overlay(text, built.render_size);
        let instruction = build_render_instruction(
            &built,
            Some(overlay),
            self.export.settings().frame_duration(),
        );

        self.export
            .export(&built.composition, &instruction, progress, cancel)
            .await
    }
}
