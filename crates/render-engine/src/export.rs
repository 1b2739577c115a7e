//! Export sessions and the ffmpeg transcode backend.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::OnceCell;

use epicshot_common::cancel::CancellationSignal;
use epicshot_common::error::{EpicshotError, EpicshotResult};
use epicshot_media_model::{
    Composition, ContainerFormat, ExportSettings, ProcessedOutput, QualityPreset,
    RenderInstruction, RenderSize,
};

use crate::compositor::{build_filter_graph, VIDEO_OUT_LABEL};

/// Progress callback for export rendering.
pub type ProgressCallback = Arc<dyn Fn(ExportProgress) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

impl ExportProgress {
    fn at_stage(stage: ExportStage, progress: f64, total_frames: u64) -> Self {
        Self {
            progress,
            frames_rendered: (progress * total_frames as f64).round() as u64,
            total_frames,
            eta_secs: 0.0,
            stage,
        }
    }
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
    Failed,
    Cancelled,
}

/// Everything a backend needs to render one output file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub filter_graph: String,
    pub render_size: RenderSize,
    pub duration_secs: f64,
    pub frame_rate: u32,
    pub total_frames: u64,
    pub quality: QualityPreset,
    pub container: ContainerFormat,
    pub optimize_for_streaming: bool,
}

/// Trait for transcode backends.
#[async_trait::async_trait]
pub trait TranscodeBackend: Send + Sync {
    /// Verify the backend can produce `plan` before any file is created.
    ///
    /// Fails with `CannotCreateExportSession`.
    async fn prepare(&self, plan: &ExportPlan) -> EpicshotResult<()>;

    /// Render `plan.output_path`. Must stop promptly once `cancel` fires.
    async fn transcode(
        &self,
        plan: &ExportPlan,
        progress: Option<ProgressCallback>,
        cancel: CancellationSignal,
    ) -> EpicshotResult<()>;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Renders a composition to a fresh file in the output directory.
#[derive(Clone)]
pub struct ExportSession {
    backend: Arc<dyn TranscodeBackend>,
    settings: ExportSettings,
}

impl ExportSession {
    pub fn new(backend: Arc<dyn TranscodeBackend>, settings: ExportSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// A collision-free output path: `<output_dir>/<uuid>.<ext>`.
    pub fn next_output_path(&self) -> PathBuf {
        self.settings.output_dir.join(format!(
            "{}.{}",
            uuid::Uuid::new_v4(),
            self.settings.container.extension()
        ))
    }

    /// Export `composition` as described by `instruction`.
    ///
    /// On any failure or cancellation the partially written file is
    /// removed, so callers only ever see complete outputs.
    pub async fn export(
        &self,
        composition: &Composition,
        instruction: &RenderInstruction,
        progress: Option<ProgressCallback>,
        cancel: CancellationSignal,
    ) -> EpicshotResult<ProcessedOutput> {
        let plan = self.build_plan(composition, instruction)?;
        report(&progress, ExportStage::Preparing, 0.0, plan.total_frames);

        tracing::info!(
            source = %plan.source_path.display(),
            output = %plan.output_path.display(),
            backend = self.backend.name(),
            quality = ?plan.quality,
            "Starting export"
        );

        if cancel.is_cancelled() {
            report(&progress, ExportStage::Cancelled, 0.0, plan.total_frames);
            return Err(EpicshotError::Cancelled);
        }

        tokio::fs::create_dir_all(&self.settings.output_dir)
            .await
            .map_err(|e| {
                EpicshotError::cannot_create_export_session(format!(
                    "Output directory {} is not writable: {e}",
                    self.settings.output_dir.display()
                ))
            })?;
        self.backend.prepare(&plan).await?;

        let started = Instant::now();
        let mut result = self
            .backend
            .transcode(&plan, progress.clone(), cancel.clone())
            .await;
        if result.is_ok() {
            result = if cancel.is_cancelled() {
                Err(EpicshotError::Cancelled)
            } else {
                verify_output(&plan.output_path).await
            };
        }

        if let Err(err) = result {
            remove_partial_output(&plan.output_path).await;
            let stage = if err.is_silent() {
                tracing::info!(output = %plan.output_path.display(), "Export cancelled");
                ExportStage::Cancelled
            } else {
                tracing::warn!(error = %err, output = %plan.output_path.display(), "Export failed");
                ExportStage::Failed
            };
            report(&progress, stage, 0.0, plan.total_frames);
            return Err(err);
        }

        report(&progress, ExportStage::Complete, 1.0, plan.total_frames);
        tracing::info!(
            output = %plan.output_path.display(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Export finished"
        );

        Ok(ProcessedOutput::new(
            plan.output_path,
            instruction.time_range.duration,
            instruction.render_size,
            plan.container,
        ))
    }

    fn build_plan(
        &self,
        composition: &Composition,
        instruction: &RenderInstruction,
    ) -> EpicshotResult<ExportPlan> {
        let source_path = composition
            .video_track()
            .and_then(|t| t.segments().first())
            .map(|s| s.source.path().to_path_buf())
            .ok_or_else(|| {
                EpicshotError::cannot_create_export_session("composition has no video segment")
            })?;
        let filter_graph = build_filter_graph(instruction)?;

        let duration_secs = instruction.time_range.duration.seconds();
        let frame_rate = instruction.frame_rate().round().max(1.0) as u32;
        Ok(ExportPlan {
            source_path,
            output_path: self.next_output_path(),
            filter_graph,
            render_size: instruction.render_size,
            duration_secs,
            frame_rate,
            total_frames: instruction.total_frames(),
            quality: self.settings.quality,
            container: self.settings.container,
            optimize_for_streaming: self.settings.optimize_for_streaming,
        })
    }
}

fn report(progress: &Option<ProgressCallback>, stage: ExportStage, fraction: f64, total: u64) {
    if let Some(cb) = progress {
        cb(ExportProgress::at_stage(stage, fraction, total));
    }
}

async fn verify_output(path: &Path) -> EpicshotResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(EpicshotError::export_failed(format!(
            "{} is empty",
            path.display()
        ))),
        Err(e) => Err(EpicshotError::export_failed(format!(
            "{} was not written: {e}",
            path.display()
        ))),
    }
}

async fn remove_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "Failed to remove partial output")
        }
    }
}

/// Transcode backend that shells out to `ffmpeg`.
#[derive(Debug)]
pub struct FfmpegBackend {
    binary: PathBuf,
    /// `ffmpeg -encoders` output; only a successful listing is cached.
    encoders: OnceCell<String>,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegBackend {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            encoders: OnceCell::new(),
        }
    }

    /// Full ffmpeg argument list for `plan`.
    pub fn build_args(&self, plan: &ExportPlan) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-nostats".to_string(),
            // Orientation is applied in the filter graph, so the output must
            // not inherit the source display matrix.
            "-noautorotate".to_string(),
            "-display_rotation".to_string(),
            "0".to_string(),
            "-i".to_string(),
            plan.source_path.to_string_lossy().to_string(),
            "-filter_complex".to_string(),
            plan.filter_graph.clone(),
            "-map".to_string(),
            format!("[{VIDEO_OUT_LABEL}]"),
            "-an".to_string(),
            "-t".to_string(),
            format!("{:.3}", plan.duration_secs),
            "-r".to_string(),
            plan.frame_rate.to_string(),
        ];
        args.extend(codec_args_for_quality(plan.quality));
        if plan.optimize_for_streaming {
            args.push("-movflags".to_string());
            args.push("+faststart".to_string());
        }
        args.push("-f".to_string());
        args.push(plan.container.extension().to_string());
        args.push(plan.output_path.to_string_lossy().to_string());
        args
    }

    /// `ffmpeg -encoders` listing, or `None` if ffmpeg cannot run.
    async fn encoder_listing(&self) -> Option<&str> {
        let listing = self
            .encoders
            .get_or_try_init(|| async {
                let output = Command::new(&self.binary)
                    .args(["-hide_banner", "-encoders"])
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .output()
                    .await
                    .map_err(|e| e.to_string())?;
                if output.status.success() {
                    Ok::<_, String>(String::from_utf8_lossy(&output.stdout).into_owned())
                } else {
                    Err(format!("exited with {}", output.status))
                }
            })
            .await;
        match listing {
            Ok(listing) => Some(listing.as_str()),
            Err(reason) => {
                tracing::warn!(binary = %self.binary.display(), %reason, "Cannot list ffmpeg encoders");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl TranscodeBackend for FfmpegBackend {
    async fn prepare(&self, plan: &ExportPlan) -> EpicshotResult<()> {
        let listing = self.encoder_listing().await.ok_or_else(|| {
            EpicshotError::cannot_create_export_session(format!(
                "{} is not available",
                self.binary.display()
            ))
        })?;
        let encoder = video_encoder_for(plan.quality);
        if !listing.split_whitespace().any(|word| word == encoder) {
            return Err(EpicshotError::cannot_create_export_session(format!(
                "encoder {encoder} is not available"
            )));
        }
        Ok(())
    }

    async fn transcode(
        &self,
        plan: &ExportPlan,
        progress: Option<ProgressCallback>,
        mut cancel: CancellationSignal,
    ) -> EpicshotResult<()> {
        let args = self.build_args(plan);
        tracing::debug!(args = ?args, "Running ffmpeg");

        let start = Instant::now();
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EpicshotError::cannot_create_export_session(format!("Failed to start ffmpeg: {e}"))
            })?;

        tracing::info!(
            pid = child.id(),
            total_frames = plan.total_frames,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EpicshotError::export_failed("Failed to capture ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| EpicshotError::export_failed("Failed to capture ffmpeg stderr"))?;

        // ffmpeg blocks if its stderr pipe fills up.
        let stderr_task = tokio::spawn(async move {
            let mut output = String::new();
            match stderr.read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut state = ProgressState::default();
        let mut last_progress_secs = 0.0f64;
        let mut last_progress_wall = Instant::now();
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => None,
                line = lines.next_line() => Some(line),
            };
            let Some(line) = next else {
                tracing::info!("ffmpeg cancelled, killing process");
                let _ = child.kill().await;
                stderr_task.abort();
                return Err(EpicshotError::Cancelled);
            };
            let line = line.map_err(|e| {
                EpicshotError::export_failed(format!("Failed reading ffmpeg progress: {e}"))
            })?;
            let Some(line) = line else { break };

            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            state.update(key, value);
            if key != "progress" {
                continue;
            }

            if state.out_time_secs > last_progress_secs + 0.001 {
                last_progress_secs = state.out_time_secs;
                last_progress_wall = Instant::now();
            }
            if let Some(cb) = &progress {
                cb(progress_report(
                    &state,
                    plan.total_frames,
                    plan.duration_secs,
                    start.elapsed().as_secs_f64(),
                ));
            }
            if last_progress_wall.elapsed().as_secs() >= 10 {
                tracing::warn!(
                    out_time_secs = state.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for 10s"
                );
                last_progress_wall = Instant::now();
            }
        }

        let waited = tokio::select! {
            _ = cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = waited else {
            tracing::info!("ffmpeg cancelled while finishing, killing process");
            let _ = child.kill().await;
            stderr_task.abort();
            return Err(EpicshotError::Cancelled);
        };
        let status =
            status.map_err(|e| EpicshotError::export_failed(format!("Failed to wait on ffmpeg: {e}")))?;

        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(EpicshotError::export_failed(format!(
                "ffmpeg export failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn video_encoder_for(_quality: QualityPreset) -> &'static str {
    "libx264"
}

fn codec_args_for_quality(quality: QualityPreset) -> Vec<String> {
    let (preset, crf) = match quality {
        QualityPreset::Highest => ("slow", "17"),
        QualityPreset::High => ("medium", "20"),
        QualityPreset::Medium => ("fast", "23"),
    };
    vec![
        "-c:v".to_string(),
        video_encoder_for(quality).to_string(),
        "-preset".to_string(),
        preset.to_string(),
        "-crf".to_string(),
        crf.to_string(),
        "-profile:v".to_string(),
        "high".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]
}

/// Key/value pairs from `-progress pipe:1`, folded per block.
#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    frame: Option<u64>,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // Both keys carry microseconds.
            "out_time_us" | "out_time_ms" => {
                if let Ok(micros) = value.parse::<f64>() {
                    self.out_time_secs = micros / 1_000_000.0;
                }
            }
            "frame" => self.frame = value.parse().ok(),
            "progress" => self.complete = value == "end",
            _ => {}
        }
    }

    /// Share of the expected duration encoded so far.
    fn fraction(&self, expected_secs: f64) -> f64 {
        if self.complete {
            1.0
        } else if expected_secs > 0.0 {
            (self.out_time_secs / expected_secs).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

fn progress_report(
    state: &ProgressState,
    total_frames: u64,
    expected_secs: f64,
    elapsed_secs: f64,
) -> ExportProgress {
    let fraction = state.fraction(expected_secs);
    let estimated_frames = (fraction * total_frames as f64).round() as u64;
    let eta_secs = if fraction > 0.0 {
        (elapsed_secs * (1.0 - fraction) / fraction).max(0.0)
    } else {
        0.0
    };
    let stage = if state.complete {
        ExportStage::Finalizing
    } else {
        ExportStage::Rendering
    };

    ExportProgress {
        progress: fraction,
        frames_rendered: state.frame.unwrap_or(estimated_frames).min(total_frames),
        total_frames,
        eta_secs,
        stage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> ExportPlan {
        ExportPlan {
            source_path: PathBuf::from("/tmp/source.mov"),
            output_path: PathBuf::from("/tmp/out/abc.mov"),
            filter_graph: "[0:v]transpose=1,format=yuv420p[vout]".to_string(),
            render_size: RenderSize {
                width: 1080,
                height: 1920,
            },
            duration_secs: 10.0,
            frame_rate: 30,
            total_frames: 300,
            quality: QualityPreset::Highest,
            container: ContainerFormat::Mov,
            optimize_for_streaming: true,
        }
    }

    fn position(args: &[String], needle: &str) -> usize {
        args.iter().position(|a| a == needle).unwrap()
    }

    #[test]
    fn test_args_disable_autorotate_on_input() {
        let args = FfmpegBackend::default().build_args(&plan());
        assert!(position(&args, "-noautorotate") < position(&args, "-i"));
        assert_eq!(args[position(&args, "-i") + 1], "/tmp/source.mov");
    }

    #[test]
    fn test_args_reset_display_matrix_on_input() {
        let args = FfmpegBackend::default().build_args(&plan());
        let reset = position(&args, "-display_rotation");
        assert_eq!(args[reset + 1], "0");
        assert!(reset < position(&args, "-i"));
        assert!(!args.iter().any(|a| a == "-display_hflip" || a == "-display_vflip"));
    }

    #[test]
    fn test_args_encode_video_only_at_highest_quality() {
        let args = FfmpegBackend::default().build_args(&plan());
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(args[position(&args, "-r") + 1], "30");
        assert_eq!(args[position(&args, "-t") + 1], "10.000");
        assert_eq!(args[position(&args, "-crf") + 1], "17");
        assert_eq!(args[position(&args, "-preset") + 1], "slow");
        assert_eq!(args[position(&args, "-map") + 1], "[vout]");
        assert_eq!(args[position(&args, "-movflags") + 1], "+faststart");
        assert_eq!(args.last().unwrap(), "/tmp/out/abc.mov");
    }

    #[test]
    fn test_args_skip_faststart_when_not_streaming() {
        let mut plan = plan();
        plan.optimize_for_streaming = false;
        plan.container = ContainerFormat::Mp4;
        let args = FfmpegBackend::default().build_args(&plan);
        assert!(!args.contains(&"-movflags".to_string()));
        assert_eq!(args[position(&args, "-f") + 1], "mp4");
    }

    #[test]
    fn test_progress_report_midway() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "5000000");
        state.update("progress", "continue");
        let report = progress_report(&state, 300, 10.0, 4.0);
        assert_eq!(report.stage, ExportStage::Rendering);
        assert!((report.progress - 0.5).abs() < 1e-9);
        assert_eq!(report.frames_rendered, 150);
        assert!((report.eta_secs - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_progress_report_end_is_finalizing() {
        let mut state = ProgressState::default();
        state.update("frame", "300");
        state.update("progress", "end");
        let report = progress_report(&state, 300, 10.0, 8.0);
        assert_eq!(report.stage, ExportStage::Finalizing);
        assert_eq!(report.progress, 1.0);
        assert_eq!(report.frames_rendered, 300);
    }

    #[tokio::test]
    async fn test_prepare_without_ffmpeg_cannot_create_session() {
        let backend = FfmpegBackend::new("/nonexistent/ffmpeg");
        let err = backend.prepare(&plan()).await.unwrap_err();
        assert!(matches!(err, EpicshotError::CannotCreateExportSession { .. }));
    }

    #[tokio::test]
    async fn test_failed_encoder_listing_is_not_cached() {
        let backend = FfmpegBackend::new("/nonexistent/ffmpeg");
        assert!(backend.prepare(&plan()).await.is_err());
        assert!(backend.encoders.get().is_none());
        assert!(backend.prepare(&plan()).await.is_err());
        assert!(backend.encoders.get().is_none());
    }

    #[tokio::test]
    async fn test_missing_or_empty_output_fails_verification() {
        let dir = std::env::temp_dir().join(format!("epicshot-verify-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("out.mov");

        assert!(verify_output(&path).await.is_err());
        tokio::fs::write(&path, b"").await.unwrap();
        assert!(verify_output(&path).await.is_err());
        tokio::fs::write(&path, b"encoded").await.unwrap();
        assert!(verify_output(&path).await.is_ok());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
