//! EpicShot Media Model
//!
//! Data contracts shared by the overlay pipeline:
//! - **Time:** rational media time and half-open ranges
//! - **Geometry:** sizes, rects, and the affine transforms that describe
//!   clip orientation
//! - **Clips:** source clip references, track metadata, overlay text
//! - **Composition:** editable track assemblies and render instructions
//! - **Export:** validated export settings and processed outputs
//!
//! No encoder or process dependencies: inputs are data, outputs are data.

pub mod clip;
pub mod composition;
pub mod export;
pub mod geometry;
pub mod overlay;
pub mod time;

pub use clip::*;
pub use composition::*;
pub use export::*;
pub use geometry::*;
pub use overlay::*;
pub use time::*;
