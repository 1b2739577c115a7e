//! Source track metadata loading.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use epicshot_common::error::{EpicshotError, EpicshotResult};
use epicshot_media_model::{AffineTransform, MediaTime, Size, SourceClip, TrackMetadata};

/// Loads the first video track's metadata from a clip.
///
/// Implementations fail with `NoVideoTrack` when the clip has no
/// decodable video stream.
#[async_trait::async_trait]
pub trait MediaProbe: Send + Sync {
    async fn load_video_track(&self, source: &SourceClip) -> EpicshotResult<TrackMetadata>;

    /// Probe name for logging.
    fn name(&self) -> &str;
}

/// Probe backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait::async_trait]
impl MediaProbe for FfprobeProbe {
    async fn load_video_track(&self, source: &SourceClip) -> EpicshotResult<TrackMetadata> {
        let path = source.path();
        if !path.exists() {
            return Err(EpicshotError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                EpicshotError::probe(format!(
                    "Failed to start {}: {e}",
                    self.binary.display()
                ))
            })?;

        if !output.status.success() {
            // ffprobe rejects files it cannot demux at all; treat them like
            // containers without a usable video stream.
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                path = %path.display(),
                status = %output.status,
                stderr = %stderr.trim(),
                "ffprobe could not read source"
            );
            return Err(EpicshotError::no_video_track(path));
        }

        let metadata = parse_probe_output(&output.stdout, path)?;
        tracing::debug!(
            path = %path.display(),
            duration = %metadata.duration,
            width = metadata.natural_size.width,
            height = metadata.natural_size.height,
            "Loaded video track"
        );
        Ok(metadata)
    }

    fn name(&self) -> &str {
        "ffprobe"
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    duration_ts: Option<i64>,
    time_base: Option<String>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    tags: std::collections::HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    side_data_type: Option<String>,
    rotation: Option<f64>,
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub(crate) fn parse_probe_output(stdout: &[u8], path: &Path) -> EpicshotResult<TrackMetadata> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| EpicshotError::probe(format!("Unreadable ffprobe output: {e}")))?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| EpicshotError::no_video_track(path))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(EpicshotError::no_video_track(path)),
    };
    let natural_size = Size::new(width as f64, height as f64);

    let duration = stream_duration(stream)
        .or_else(|| {
            probe
                .format
                .as_ref()
                .and_then(|f| f.duration.as_deref())
                .and_then(parse_seconds)
        })
        .filter(MediaTime::is_positive)
        .ok_or_else(|| EpicshotError::probe(format!("No duration for {}", path.display())))?;

    let clockwise = clockwise_rotation_degrees(stream);
    let orientation_transform = AffineTransform::from_clockwise_degrees(clockwise, natural_size)
        .unwrap_or_else(|| {
            tracing::warn!(
                degrees = clockwise,
                path = %path.display(),
                "Ignoring non-quarter-turn rotation"
            );
            AffineTransform::IDENTITY
        });

    let nominal_frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate));

    Ok(TrackMetadata {
        duration,
        natural_size,
        orientation_transform,
        nominal_frame_rate,
        codec: stream.codec_name.clone(),
    })
}

/// Exact duration from `duration_ts`/`time_base` when the base is `1/N`,
/// otherwise the floating-point `duration` field.
fn stream_duration(stream: &ProbeStream) -> Option<MediaTime> {
    if let (Some(ticks), Some(base)) = (stream.duration_ts, stream.time_base.as_deref()) {
        if let Some(("1", den)) = base.split_once('/') {
            if let Ok(scale) = den.parse::<i32>() {
                if scale > 0 {
                    return Some(MediaTime::new(ticks, scale));
                }
            }
        }
    }
    stream.duration.as_deref().and_then(parse_seconds)
}

fn parse_seconds(raw: &str) -> Option<MediaTime> {
    let secs = raw.trim().parse::<f64>().ok()?;
    secs.is_finite()
        .then(|| MediaTime::from_seconds(secs, epicshot_media_model::DEFAULT_TIMESCALE))
}

/// Rotation needed to display the stream upright, clockwise degrees.
///
/// The display matrix reports a counter-clockwise angle; the legacy
/// `rotate` tag is already clockwise.
fn clockwise_rotation_degrees(stream: &ProbeStream) -> f64 {
    let from_matrix = stream
        .side_data_list
        .iter()
        .filter(|sd| {
            sd.side_data_type
                .as_deref()
                .map_or(true, |t| t.eq_ignore_ascii_case("Display Matrix"))
        })
        .find_map(|sd| sd.rotation);
    if let Some(ccw) = from_matrix {
        return -ccw;
    }
    stream
        .tags
        .get("rotate")
        .and_then(|r| r.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|fps: &f64| *fps > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use epicshot_media_model::Orientation;

    const PORTRAIT_PHONE: &str = r#"{
        "streams": [
            {"codec_type": "audio", "codec_name": "aac"},
            {
                "codec_type": "video",
                "codec_name": "hevc",
                "width": 1920,
                "height": 1080,
                "duration": "10.000000",
                "duration_ts": 6000,
                "time_base": "1/600",
                "avg_frame_rate": "30/1",
                "side_data_list": [
                    {"side_data_type": "Display Matrix", "displaymatrix": "...", "rotation": -90}
                ]
            }
        ],
        "format": {"duration": "10.020000"}
    }"#;

    #[test]
    fn test_display_matrix_rotation_becomes_quarter_turn() {
        let meta = parse_probe_output(PORTRAIT_PHONE.as_bytes(), Path::new("a.mov")).unwrap();
        assert_eq!(
            meta.orientation_transform.orientation(),
            Some(Orientation::Rotate90)
        );
        assert_eq!(meta.duration, MediaTime::new(6000, 600));
        let render = meta.render_size().unwrap();
        assert_eq!((render.width, render.height), (1080, 1920));
        assert_eq!(meta.nominal_frame_rate, Some(30.0));
        assert_eq!(meta.codec.as_deref(), Some("hevc"));
    }

    #[test]
    fn test_legacy_rotate_tag_is_clockwise() {
        let json = r#"{"streams":[{"codec_type":"video","width":640,"height":480,
            "duration":"2.5","tags":{"rotate":"270"}}]}"#;
        let meta = parse_probe_output(json.as_bytes(), Path::new("a.mp4")).unwrap();
        assert_eq!(
            meta.orientation_transform.orientation(),
            Some(Orientation::Rotate270)
        );
        assert_eq!(meta.duration, MediaTime::from_seconds(2.5, 600));
    }

    #[test]
    fn test_audio_only_has_no_video_track() {
        let json = r#"{"streams":[{"codec_type":"audio","codec_name":"aac","duration":"3.0"}],
            "format":{"duration":"3.0"}}"#;
        let err = parse_probe_output(json.as_bytes(), Path::new("voice.m4a")).unwrap_err();
        assert!(matches!(err, EpicshotError::NoVideoTrack { .. }));
    }

    #[test]
    fn test_container_duration_fallback() {
        let json = r#"{"streams":[{"codec_type":"video","width":1280,"height":720}],
            "format":{"duration":"4.000000"}}"#;
        let meta = parse_probe_output(json.as_bytes(), Path::new("a.mov")).unwrap();
        assert_eq!(meta.duration, MediaTime::new(4, 1));
        assert!(meta.orientation_transform.is_identity());
    }

    #[test]
    fn test_zero_sized_stream_is_not_a_video_track() {
        let json = r#"{"streams":[{"codec_type":"video","width":0,"height":0,"duration":"1.0"}]}"#;
        let err = parse_probe_output(json.as_bytes(), Path::new("a.mov")).unwrap_err();
        assert!(matches!(err, EpicshotError::NoVideoTrack { .. }));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
    }

    #[tokio::test]
    async fn test_missing_file_is_reported_before_spawning() {
        let probe = FfprobeProbe::new("/nonexistent/ffprobe");
        let err = probe
            .load_video_track(&SourceClip::new("/nonexistent/clip.mov"))
            .await
            .unwrap_err();
        assert!(matches!(err, EpicshotError::FileNotFound { .. }));
    }
}
