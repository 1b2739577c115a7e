//! Video compositor: combines the oriented source track with the overlay.
//!
//! Produces the [`RenderInstruction`] for a built composition and lowers
//! it to an ffmpeg filter graph.

use epicshot_common::error::{EpicshotError, EpicshotResult};
use epicshot_media_model::{
    LayerInstruction, MediaTime, Orientation, OverlaySurface, RenderInstruction, TimeRange,
};

use crate::builder::BuiltComposition;
use crate::overlay::drawtext_filter;

/// Label of the filter graph's video output.
pub const VIDEO_OUT_LABEL: &str = "vout";

/// Render instruction covering the whole composition.
///
/// One layer instruction applies the track's preferred transform from time
/// zero; the overlay, if any, sits above it for the full range.
pub fn build_render_instruction(
    built: &BuiltComposition,
    overlay: Option<OverlaySurface>,
    frame_duration: MediaTime,
) -> RenderInstruction {
    let preferred = built
        .composition
        .track(built.video_track)
        .map(|t| t.preferred_transform)
        .unwrap_or(built.metadata.orientation_transform);

    let mut layer = LayerInstruction::new(built.video_track);
    layer.set_transform(preferred, MediaTime::ZERO);

    RenderInstruction {
        time_range: TimeRange::from_zero(built.duration),
        layer_instructions: vec![layer],
        overlay,
        render_size: built.render_size,
        frame_duration,
    }
}

/// ffmpeg filters that reorient decoded frames.
///
/// `transpose` directions are for y-down pixel space: `1` rotates
/// clockwise, `2` counter-clockwise.
pub fn orientation_filters(orientation: Orientation) -> &'static [&'static str] {
    match orientation {
        Orientation::Identity => &[],
        Orientation::Rotate90 => &["transpose=1"],
        Orientation::Rotate180 => &["hflip", "vflip"],
        Orientation::Rotate270 => &["transpose=2"],
        Orientation::FlipHorizontal => &["hflip"],
        Orientation::FlipVertical => &["vflip"],
        Orientation::Transpose => &["transpose=0"],
        Orientation::AntiTranspose => &["transpose=3"],
    }
}

/// Build the `-filter_complex` graph for a render instruction.
///
/// Only a single static, axis-aligned layer transform can be lowered;
/// anything else cannot be exported.
pub fn build_filter_graph(instruction: &RenderInstruction) -> EpicshotResult<String> {
    let layer = match instruction.layer_instructions.as_slice() {
        [layer] => layer,
        [] => {
            return Err(EpicshotError::cannot_create_export_session(
                "render instruction has no video layer",
            ))
        }
        _ => {
            return Err(EpicshotError::cannot_create_export_session(
                "multiple video layers are not supported",
            ))
        }
    };
    if !layer.is_static() {
        return Err(EpicshotError::cannot_create_export_session(
            "time-varying layer transforms are not supported",
        ));
    }

    let transform = layer.transform_at(instruction.time_range.start);
    let orientation = transform.orientation().ok_or_else(|| {
        EpicshotError::cannot_create_export_session(format!(
            "unsupported orientation transform {transform:?}"
        ))
    })?;

    let mut chain: Vec<String> = orientation_filters(orientation)
        .iter()
        .map(|f| f.to_string())
        .collect();
    if let Some(overlay) = &instruction.overlay {
        chain.push(drawtext_filter(overlay, instruction.render_size));
    }
    chain.push("format=yuv420p".to_string());

    Ok(format!("[0:v]{}[{VIDEO_OUT_LABEL}]", chain.join(",")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_from_metadata;
    use crate::overlay::OverlayRenderer;
    use epicshot_media_model::{
        AffineTransform, OverlayText, PlacementPosition, Size, SourceClip, TrackMetadata,
    };

    fn built(transform: AffineTransform) -> BuiltComposition {
        build_from_metadata(
            &SourceClip::new("/tmp/clip.mov"),
            TrackMetadata {
                duration: MediaTime::new(10, 1),
                natural_size: Size::new(1920.0, 1080.0),
                orientation_transform: transform,
                nominal_frame_rate: Some(30.0),
                codec: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_instruction_covers_full_range_at_thirty_fps() {
        let natural = Size::new(1920.0, 1080.0);
        let built = built(AffineTransform::quarter_turns(1, natural));
        let instruction = build_render_instruction(&built, None, MediaTime::new(1, 30));

        assert_eq!(instruction.time_range, TimeRange::from_zero(MediaTime::new(10, 1)));
        assert_eq!(instruction.layer_instructions.len(), 1);
        assert_eq!(instruction.frame_rate(), 30.0);
        assert_eq!(instruction.total_frames(), 300);
        assert_eq!(
            instruction.layer_instructions[0]
                .transform_at(MediaTime::ZERO)
                .orientation(),
            Some(Orientation::Rotate90)
        );
    }

    #[test]
    fn test_filter_graph_rotates_then_draws_text() {
        let natural = Size::new(1920.0, 1080.0);
        let built = built(AffineTransform::quarter_turns(1, natural));
        let overlay = OverlayRenderer::default().make_overlay(
            &OverlayText::new("EpicShot Demo", PlacementPosition::Bottom),
            built.render_size,
        );
        let instruction = build_render_instruction(&built, Some(overlay), MediaTime::new(1, 30));
        let graph = build_filter_graph(&instruction).unwrap();

        assert!(graph.starts_with("[0:v]transpose=1,drawtext="));
        assert!(graph.contains(":y=1820.000"));
        assert!(graph.ends_with(",format=yuv420p[vout]"));
    }

    #[test]
    fn test_identity_has_no_reorientation_filters() {
        let built = built(AffineTransform::IDENTITY);
        let instruction = build_render_instruction(&built, None, MediaTime::new(1, 30));
        assert_eq!(
            build_filter_graph(&instruction).unwrap(),
            "[0:v]format=yuv420p[vout]"
        );
    }

    #[test]
    fn test_sheared_transform_cannot_be_exported() {
        let built = built(AffineTransform::IDENTITY);
        let mut instruction = build_render_instruction(&built, None, MediaTime::new(1, 30));
        instruction.layer_instructions[0]
            .set_transform(AffineTransform::new(1.0, 0.3, 0.0, 1.0, 0.0, 0.0), MediaTime::ZERO);

        let err = build_filter_graph(&instruction).unwrap_err();
        assert!(matches!(err, EpicshotError::CannotCreateExportSession { .. }));
    }

    #[test]
    fn test_every_orientation_has_a_filter_chain() {
        assert_eq!(orientation_filters(Orientation::Rotate270), &["transpose=2"]);
        assert_eq!(orientation_filters(Orientation::Rotate180), &["hflip", "vflip"]);
        assert!(orientation_filters(Orientation::Identity).is_empty());
    }
}
