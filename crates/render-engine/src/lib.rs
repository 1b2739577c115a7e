//! EpicShot Render Engine
//!
//! Batch pipeline that burns a timestamped text overlay into a recorded
//! clip and re-encodes it to a new file.
//!
//! # Pipeline Architecture
//!
//! ```text
//! source.mov ──► probe (duration, natural size, orientation)
//!                  │
//!                  ▼
//!            Composition (full range, offset 0) ──► RenderSize
//!                                                      │
//! overlay text ──► Overlay layout (top / center / bottom, 2s fade)
//!                                                      │
//!                  ┌───────────────────────────────────┘
//!                  ▼
//!            Render instruction ──► transpose/flip ► drawtext ► H.264
//!                                                      │
//!                                                      ▼
//!                                              <uuid>.mov
//! ```

pub mod builder;
pub mod compositor;
pub mod export;
pub mod overlay;
pub mod pipeline;
pub mod probe;

pub use builder::{BuiltComposition, CompositionBuilder};
pub use export::*;
pub use overlay::OverlayRenderer;
pub use pipeline::OverlayPipeline;
pub use probe::{FfprobeProbe, MediaProbe};
