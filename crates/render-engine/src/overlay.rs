//! Overlay renderer: text layer layout, styling, and fade-in.
//!
//! Layout happens in the upright render space with a bottom-left origin.
//! Lowering to the encoder flips it into the encoder's top-left space.

use epicshot_common::config::OverlayDefaults;
use epicshot_media_model::{
    AffineTransform, OpacityFade, OverlaySurface, OverlayText, PlacementPosition, Rect, RenderSize,
    TextAlignment, TextStyle,
};

/// Height of the overlay band.
pub const OVERLAY_HEIGHT: f64 = 80.0;
/// Overlay font size.
pub const OVERLAY_FONT_SIZE: f64 = 42.0;
/// Distance from the top edge of the frame to the bottom of the top band.
pub const TOP_INSET: f64 = 120.0;
/// Distance from the bottom edge of the frame to the bottom band.
pub const BOTTOM_MARGIN: f64 = 20.0;
/// Length of the fade-in, starting at composition time zero.
pub const FADE_IN_SECS: f64 = 2.0;

/// Builds overlay surfaces with a fixed style.
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    font_family: String,
    color: String,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(&OverlayDefaults::default())
    }
}

impl OverlayRenderer {
    pub fn new(defaults: &OverlayDefaults) -> Self {
        Self {
            font_family: defaults.font_family.clone(),
            color: defaults.color.clone(),
        }
    }

    /// Lay out `text` for a frame of `render_size`.
    pub fn make_overlay(&self, text: &OverlayText, render_size: RenderSize) -> OverlaySurface {
        let frame = overlay_frame(render_size, text.position);
        tracing::debug!(
            position = %text.position,
            y = frame.y,
            width = frame.width,
            "Overlay laid out"
        );
        OverlaySurface {
            text: text.content.clone(),
            frame,
            style: TextStyle {
                font_size: OVERLAY_FONT_SIZE,
                font_family: self.font_family.clone(),
                color: self.color.clone(),
                alignment: TextAlignment::Center,
            },
            fade: Some(OpacityFade {
                from: 0.0,
                to: 1.0,
                begin_secs: 0.0,
                duration_secs: FADE_IN_SECS,
            }),
        }
    }
}

/// Full-width overlay band for `position`, bottom-left origin.
pub fn overlay_frame(render_size: RenderSize, position: PlacementPosition) -> Rect {
    let size = render_size.as_size();
    let band = |y: f64| Rect::new(0.0, y, size.width, OVERLAY_HEIGHT);
    match position {
        PlacementPosition::Center => band(size.height / 2.0 - OVERLAY_HEIGHT / 2.0),
        PlacementPosition::Bottom => band(BOTTOM_MARGIN),
        // Top is the fallback for anything not matched above.
        _ => band(size.height - TOP_INSET),
    }
}

/// Lower an overlay surface to an ffmpeg `drawtext` filter.
pub fn drawtext_filter(surface: &OverlaySurface, render_size: RenderSize) -> String {
    let to_top_left = AffineTransform::flip_vertical(render_size.height as f64);
    let frame = to_top_left.apply_to_rect(surface.frame);

    let x = match surface.style.alignment {
        TextAlignment::Left => format!("{:.3}", frame.x),
        TextAlignment::Center => format!("{:.3}+({:.3}-text_w)/2", frame.x, frame.width),
        TextAlignment::Right => format!("{:.3}-text_w", frame.max_x()),
    };

    let mut options = vec![
        format!("text={}", escape_filter_value(&surface.text)),
        "expansion=none".to_string(),
        format!("font={}", escape_filter_value(&surface.style.font_family)),
        format!("fontsize={}", surface.style.font_size),
        format!("fontcolor={}", escape_filter_value(&surface.style.color)),
        format!("x={}", escape_filter_value(&x)),
        format!("y={:.3}", frame.y),
    ];

    if let Some(fade) = surface.fade {
        options.push(format!("alpha={}", escape_filter_value(&alpha_expr(&fade))));
    }

    format!("drawtext={}", options.join(":"))
}

/// Opacity as a function of presentation time `t`.
fn alpha_expr(fade: &OpacityFade) -> String {
    if fade.duration_secs <= 0.0 {
        return format!("{:.3}", fade.to);
    }
    format!(
        "{from:.3}+({delta:.3})*clip((t-{begin:.3})/{dur:.3},0,1)",
        from = fade.from,
        delta = fade.to - fade.from,
        begin = fade.begin_secs,
        dur = fade.duration_secs,
    )
}

/// Escape an option value for use inside `-filter_complex`.
///
/// Two levels: the option parser (`\ ' :`), then the filtergraph
/// parser (`\ ' [ ] , ;`).
pub fn escape_filter_value(value: &str) -> String {
    escape_chars(&escape_chars(value, &['\\', '\'', ':']), &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if special.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PORTRAIT: RenderSize = RenderSize {
        width: 1080,
        height: 1920,
    };

    #[test]
    fn test_top_band_is_inset_from_top_edge() {
        let frame = overlay_frame(PORTRAIT, PlacementPosition::Top);
        assert_eq!(frame, Rect::new(0.0, 1800.0, 1080.0, 80.0));
    }

    #[test]
    fn test_center_band_is_vertically_centered() {
        let frame = overlay_frame(PORTRAIT, PlacementPosition::Center);
        assert_eq!(frame.y, 920.0);
    }

    #[test]
    fn test_bottom_band_has_fixed_margin() {
        let frame = overlay_frame(PORTRAIT, PlacementPosition::Bottom);
        assert_eq!(frame.y, 20.0);
    }

    #[test]
    fn test_unrecognized_selector_matches_top() {
        let parsed = PlacementPosition::parse_lossy("diagonal");
        assert_eq!(
            overlay_frame(PORTRAIT, parsed),
            overlay_frame(PORTRAIT, PlacementPosition::Top)
        );
    }

    #[test]
    fn test_surface_style_and_fade() {
        let renderer = OverlayRenderer::default();
        let surface = renderer.make_overlay(
            &OverlayText::new("EpicShot Demo • 2026-02-10 09:05:07", PlacementPosition::Bottom),
            PORTRAIT,
        );
        assert_eq!(surface.style.font_size, 42.0);
        assert_eq!(surface.style.alignment, TextAlignment::Center);
        assert_eq!(surface.style.color, "red");
        let fade = surface.fade.unwrap();
        assert_eq!((fade.from, fade.to, fade.begin_secs, fade.duration_secs), (0.0, 1.0, 0.0, 2.0));
    }

    #[test]
    fn test_drawtext_places_bottom_band_in_top_left_space() {
        let renderer = OverlayRenderer::default();
        let surface = renderer.make_overlay(
            &OverlayText::new("EpicShot Demo", PlacementPosition::Bottom),
            PORTRAIT,
        );
        let filter = drawtext_filter(&surface, PORTRAIT);
        assert!(filter.starts_with("drawtext=text=EpicShot Demo:"));
        assert!(filter.contains(":y=1820.000"));
        assert!(filter.contains(":fontsize=42"));
        assert!(filter.contains(":fontcolor=red"));
        assert!(filter.contains("x=0.000+(1080.000-text_w)/2"));
        assert!(filter.contains("alpha=0.000+(1.000)*clip((t-0.000)/2.000\\,0\\,1)"));
    }

    #[test]
    fn test_escape_follows_filtergraph_rules() {
        assert_eq!(
            escape_filter_value("this is a 'string': may contain one, or more, special characters"),
            "this is a \\\\\\'string\\\\\\'\\\\: may contain one\\, or more\\, special characters"
        );
    }

    #[test]
    fn test_timestamp_colons_are_escaped() {
        assert_eq!(escape_filter_value("09:05"), "09\\\\:05");
    }

    proptest! {
        #[test]
        fn prop_band_is_full_width_and_fixed_height(
            w in 16u32..4096,
            h in 16u32..4096,
            selector in "[A-Za-z]{0,8}",
        ) {
            let size = RenderSize { width: w, height: h };
            let frame = overlay_frame(size, PlacementPosition::parse_lossy(&selector));
            prop_assert_eq!(frame.x, 0.0);
            prop_assert_eq!(frame.width, w as f64);
            prop_assert_eq!(frame.height, OVERLAY_HEIGHT);
        }
    }
}
