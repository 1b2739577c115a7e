//! Overlay surfaces composited above decoded video.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Horizontal text alignment inside the overlay frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlignment {
    Left,
    Center,
    Right,
}

/// Text styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_size: f64,
    pub font_family: String,
    pub color: String,
    pub alignment: TextAlignment,
}

/// Opacity ramp evaluated on presentation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpacityFade {
    pub from: f64,
    pub to: f64,
    /// Composition time at which the ramp starts, in seconds.
    pub begin_secs: f64,
    pub duration_secs: f64,
}

impl OpacityFade {
    /// Opacity at presentation time `t` (seconds).
    pub fn opacity_at(&self, t: f64) -> f64 {
        if self.duration_secs <= 0.0 || t >= self.begin_secs + self.duration_secs {
            return self.to;
        }
        if t <= self.begin_secs {
            return self.from;
        }
        let progress = (t - self.begin_secs) / self.duration_secs;
        self.from + (self.to - self.from) * progress
    }
}

/// A static text layer with its animation.
///
/// `frame` is in the upright render space with a bottom-left origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySurface {
    pub text: String,
    pub frame: Rect,
    pub style: TextStyle,
    pub fade: Option<OpacityFade>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_ramps_linearly_then_holds() {
        let fade = OpacityFade {
            from: 0.0,
            to: 1.0,
            begin_secs: 0.0,
            duration_secs: 2.0,
        };
        assert_eq!(fade.opacity_at(0.0), 0.0);
        assert!((fade.opacity_at(1.0) - 0.5).abs() < 1e-9);
        assert_eq!(fade.opacity_at(2.0), 1.0);
        assert_eq!(fade.opacity_at(9.0), 1.0);
    }

    #[test]
    fn test_zero_length_fade_is_immediate() {
        let fade = OpacityFade {
            from: 0.0,
            to: 1.0,
            begin_secs: 0.0,
            duration_secs: 0.0,
        };
        assert_eq!(fade.opacity_at(0.0), 1.0);
    }
}
