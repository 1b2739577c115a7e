//! Editable compositions and the render instructions that drive export.
//!
//! A [`Composition`] is an in-memory assembly of track segments copied from
//! source clips. A [`RenderInstruction`] says how those tracks are
//! transformed and layered for a time range.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clip::SourceClip;
use crate::geometry::{AffineTransform, RenderSize};
use crate::overlay::OverlaySurface;
use crate::time::{MediaTime, TimeRange};

/// Identifier of a track within one composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u32);

/// Errors raised while editing a composition.
#[derive(Debug, Error, PartialEq)]
pub enum CompositionError {
    #[error("time range starting at {start} is empty")]
    EmptyRange { start: MediaTime },

    #[error("insertion at {at} overlaps an existing segment")]
    Overlap { at: MediaTime },
}

/// A slice of a source clip placed on a composition track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSegment {
    pub source: SourceClip,
    /// Range read from the source.
    pub source_range: TimeRange,
    /// Range occupied on the composition timeline.
    pub target_range: TimeRange,
}

/// One video track of a composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionTrack {
    pub id: TrackId,
    pub preferred_transform: AffineTransform,
    segments: Vec<TrackSegment>,
}

impl CompositionTrack {
    fn new(id: TrackId) -> Self {
        Self {
            id,
            preferred_transform: AffineTransform::IDENTITY,
            segments: Vec::new(),
        }
    }

    pub fn segments(&self) -> &[TrackSegment] {
        &self.segments
    }

    /// Copy `range` of `source` onto this track starting at `at`.
    pub fn insert_time_range(
        &mut self,
        range: TimeRange,
        source: &SourceClip,
        at: MediaTime,
    ) -> Result<(), CompositionError> {
        if range.is_empty() {
            return Err(CompositionError::EmptyRange { start: range.start });
        }

        let target = TimeRange::new(at, range.duration);
        let overlaps = self
            .segments
            .iter()
            .any(|s| target.start < s.target_range.end() && s.target_range.start < target.end());
        if overlaps {
            return Err(CompositionError::Overlap { at });
        }

        self.segments.push(TrackSegment {
            source: source.clone(),
            source_range: range,
            target_range: target,
        });
        self.segments
            .sort_by(|a, b| a.target_range.start.cmp(&b.target_range.start));
        Ok(())
    }

    /// End of the last segment, or zero for an empty track.
    pub fn duration(&self) -> MediaTime {
        self.segments
            .iter()
            .map(|s| s.target_range.end())
            .max()
            .unwrap_or(MediaTime::ZERO)
    }
}

/// Mutable assembly of video tracks. Lives for one processing request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    tracks: Vec<CompositionTrack>,
    next_id: u32,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty track and return it for editing.
    pub fn add_track(&mut self) -> &mut CompositionTrack {
        self.next_id += 1;
        self.tracks.push(CompositionTrack::new(TrackId(self.next_id)));
        let last = self.tracks.len() - 1;
        &mut self.tracks[last]
    }

    pub fn tracks(&self) -> &[CompositionTrack] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// First video track, if any.
    pub fn video_track(&self) -> Option<&CompositionTrack> {
        self.tracks.first()
    }

    /// Longest track duration.
    pub fn duration(&self) -> MediaTime {
        self.tracks
            .iter()
            .map(CompositionTrack::duration)
            .max()
            .unwrap_or(MediaTime::ZERO)
    }
}

/// Transform ramp for one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInstruction {
    pub track_id: TrackId,
    transforms: Vec<(MediaTime, AffineTransform)>,
}

impl LayerInstruction {
    pub fn new(track_id: TrackId) -> Self {
        Self {
            track_id,
            transforms: Vec::new(),
        }
    }

    /// Set the transform in effect from `at` onward.
    pub fn set_transform(&mut self, transform: AffineTransform, at: MediaTime) {
        self.transforms.retain(|(t, _)| *t != at);
        self.transforms.push((at, transform));
        self.transforms.sort_by(|a, b| a.0.cmp(&b.0));
    }

    /// Transform in effect at `t`; identity before the first entry.
    pub fn transform_at(&self, t: MediaTime) -> AffineTransform {
        self.transforms
            .iter()
            .rev()
            .find(|(at, _)| *at <= t)
            .map(|(_, transform)| *transform)
            .unwrap_or(AffineTransform::IDENTITY)
    }

    /// True when one transform applies for the whole range.
    pub fn is_static(&self) -> bool {
        self.transforms.len() <= 1
    }
}

/// How to render a composition: time range, layer transforms, overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderInstruction {
    pub time_range: TimeRange,
    pub layer_instructions: Vec<LayerInstruction>,
    pub overlay: Option<OverlaySurface>,
    pub render_size: RenderSize,
    pub frame_duration: MediaTime,
}

impl RenderInstruction {
    /// Nominal frame rate implied by `frame_duration`.
    pub fn frame_rate(&self) -> f64 {
        let secs = self.frame_duration.seconds();
        if secs > 0.0 {
            1.0 / secs
        } else {
            0.0
        }
    }

    /// Frames covered by the instruction's time range.
    pub fn total_frames(&self) -> u64 {
        let d = self.time_range.duration;
        let f = self.frame_duration;
        if d.value <= 0 || f.value <= 0 || d.timescale <= 0 || f.timescale <= 0 {
            return 0;
        }
        // ceil((d.value / d.timescale) / (f.value / f.timescale))
        let num = d.value as i128 * f.timescale as i128;
        let den = f.value as i128 * d.timescale as i128;
        ((num + den - 1) / den) as u64
    }
}
