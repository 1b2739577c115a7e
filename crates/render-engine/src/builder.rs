//! Composition builder: source clip in, orientation-correct composition out.

use std::sync::Arc;

use epicshot_common::error::{EpicshotError, EpicshotResult};
use epicshot_media_model::{
    Composition, MediaTime, RenderSize, SourceClip, TimeRange, TrackId, TrackMetadata,
};

use crate::probe::MediaProbe;

/// Result of building a composition for one request.
#[derive(Debug, Clone)]
pub struct BuiltComposition {
    pub composition: Composition,
    /// The single video track copied from the source.
    pub video_track: TrackId,
    /// Upright frame size.
    pub render_size: RenderSize,
    pub duration: MediaTime,
    pub metadata: TrackMetadata,
}

/// Builds full-length, single-video-track compositions.
#[derive(Clone)]
pub struct CompositionBuilder {
    probe: Arc<dyn MediaProbe>,
}

impl CompositionBuilder {
    pub fn new(probe: Arc<dyn MediaProbe>) -> Self {
        Self { probe }
    }

    /// Load the source's first video track and copy all of it, at offset
    /// zero, into a new composition.
    pub async fn build(&self, source: &SourceClip) -> EpicshotResult<BuiltComposition> {
        let metadata = self.probe.load_video_track(source).await?;
        tracing::debug!(
            probe = self.probe.name(),
            codec = metadata.codec.as_deref().unwrap_or("unknown"),
            nominal_frame_rate = ?metadata.nominal_frame_rate,
            "Loaded video track"
        );
        build_from_metadata(source, metadata)
    }
}

/// Assemble the composition from already-loaded metadata.
pub fn build_from_metadata(
    source: &SourceClip,
    metadata: TrackMetadata,
) -> EpicshotResult<BuiltComposition> {
    let render_size = metadata
        .render_size()
        .ok_or_else(|| EpicshotError::no_video_track(source.path()))?;
    let duration = metadata.duration;

    let mut composition = Composition::new();
    let track = composition.add_track();
    track
        .insert_time_range(TimeRange::from_zero(duration), source, MediaTime::ZERO)
        .map_err(|e| {
            tracing::warn!(error = %e, path = %source.path().display(), "Source track is empty");
            EpicshotError::no_video_track(source.path())
        })?;
    track.preferred_transform = metadata.orientation_transform;
    let video_track = track.id;

    tracing::info!(
        source = %source.path().display(),
        duration = %duration,
        natural_width = metadata.natural_size.width,
        natural_height = metadata.natural_size.height,
        render_width = render_size.width,
        render_height = render_size.height,
        portrait = render_size.is_portrait(),
        "Composition built"
    );

    Ok(BuiltComposition {
        composition,
        video_track,
        render_size,
        duration,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use epicshot_media_model::{AffineTransform, Size};

    fn metadata(turns: i32, duration: MediaTime) -> TrackMetadata {
        let natural = Size::new(1920.0, 1080.0);
        TrackMetadata {
            duration,
            natural_size: natural,
            orientation_transform: AffineTransform::quarter_turns(turns, natural),
            nominal_frame_rate: Some(30.0),
            codec: None,
        }
    }

    #[test]
    fn test_composition_spans_whole_source() {
        let source = SourceClip::new("/tmp/clip.mov");
        let built = build_from_metadata(&source, metadata(1, MediaTime::new(6000, 600))).unwrap();

        assert_eq!(built.duration, MediaTime::new(10, 1));
        assert_eq!(built.composition.duration(), built.duration);
        let track = built.composition.track(built.video_track).unwrap();
        assert_eq!(track.segments().len(), 1);
        assert_eq!(track.segments()[0].target_range.start, MediaTime::ZERO);
        assert_eq!(track.segments()[0].source_range.start, MediaTime::ZERO);
        assert_eq!(
            track.preferred_transform.orientation(),
            Some(epicshot_media_model::Orientation::Rotate90)
        );
        assert_eq!((built.render_size.width, built.render_size.height), (1080, 1920));
    }

    #[test]
    fn test_zero_duration_is_no_video_track() {
        let source = SourceClip::new("/tmp/clip.mov");
        let err = build_from_metadata(&source, metadata(0, MediaTime::new(0, 600))).unwrap_err();
        assert!(matches!(err, EpicshotError::NoVideoTrack { .. }));
    }
}
