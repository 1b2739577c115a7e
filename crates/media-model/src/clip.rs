//! Source clips, their track metadata, and overlay text requests.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geometry::{AffineTransform, RenderSize, Size};
use crate::time::MediaTime;

/// A recorded media file on local storage. Never modified by processing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceClip {
    path: PathBuf,
}

impl SourceClip {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Metadata of a clip's first video track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Track duration.
    pub duration: MediaTime,

    /// Frame size as stored (sensor orientation).
    pub natural_size: Size,

    /// Transform that turns stored frames upright.
    pub orientation_transform: AffineTransform,

    /// Nominal frame rate, when the container reports one.
    pub nominal_frame_rate: Option<f64>,

    /// Codec name reported by the container.
    pub codec: Option<String>,
}

impl TrackMetadata {
    /// Upright frame size. `None` for degenerate tracks.
    pub fn render_size(&self) -> Option<RenderSize> {
        RenderSize::from_transformed(self.natural_size, &self.orientation_transform)
    }
}

/// Where the overlay text sits in the upright frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlacementPosition {
    #[default]
    Top,
    Center,
    Bottom,
}

impl PlacementPosition {
    pub const ALL: [PlacementPosition; 3] = [
        PlacementPosition::Top,
        PlacementPosition::Center,
        PlacementPosition::Bottom,
    ];

    /// Parse a selector value. Unrecognized values select `Top`.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "center" | "centre" | "middle" => PlacementPosition::Center,
            "bottom" => PlacementPosition::Bottom,
            "top" => PlacementPosition::Top,
            other => {
                tracing::debug!(value = other, "Unrecognized overlay position, using top");
                PlacementPosition::Top
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlacementPosition::Top => "Top",
            PlacementPosition::Center => "Center",
            PlacementPosition::Bottom => "Bottom",
        }
    }
}

impl FromStr for PlacementPosition {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lossy(s))
    }
}

impl std::fmt::Display for PlacementPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text to burn into a clip and where to put it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayText {
    pub content: String,
    pub position: PlacementPosition,
}

impl OverlayText {
    pub fn new(content: impl Into<String>, position: PlacementPosition) -> Self {
        Self {
            content: content.into(),
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_positions() {
        assert_eq!(PlacementPosition::parse_lossy("Top"), PlacementPosition::Top);
        assert_eq!(
            PlacementPosition::parse_lossy(" center "),
            PlacementPosition::Center
        );
        assert_eq!(
            PlacementPosition::parse_lossy("BOTTOM"),
            PlacementPosition::Bottom
        );
    }

    #[test]
    fn test_unknown_position_falls_back_to_top() {
        assert_eq!(PlacementPosition::parse_lossy("Left"), PlacementPosition::Top);
        assert_eq!("".parse::<PlacementPosition>().unwrap(), PlacementPosition::Top);
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for position in PlacementPosition::ALL {
            assert_eq!(PlacementPosition::parse_lossy(&position.to_string()), position);
        }
    }

    #[test]
    fn test_track_render_size_uses_orientation() {
        let natural = Size::new(1920.0, 1080.0);
        let meta = TrackMetadata {
            duration: MediaTime::new(6000, 600),
            natural_size: natural,
            orientation_transform: AffineTransform::quarter_turns(1, natural),
            nominal_frame_rate: Some(30.0),
            codec: Some("h264".to_string()),
        };
        let size = meta.render_size().unwrap();
        assert_eq!((size.width, size.height), (1080, 1920));
    }
}
