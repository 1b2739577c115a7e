//! EpicShot Preview
//!
//! Drives the overlay pipeline on behalf of a preview screen. A
//! [`PreviewSession`] owns one recorded clip and re-runs the pipeline every
//! time the overlay position changes; only the newest request may publish.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                PreviewSession                 │
//! │  start / set_position / retry                 │
//! │        │ cancel previous, bump generation     │
//! │        ▼                                      │
//! │  ┌──────────────────┐   watch::Sender         │
//! │  │  OverlayPipeline │ ──► ProcessingState ────┼──► subscribers
//! │  └──────────────────┘                         │
//! │        │ Ready(output)                        │
//! │        ▼                                      │
//! │  save_to_library(LibrarySaver)                │
//! └──────────────────────────────────────────────┘
//! ```

pub mod save;
pub mod session;
pub mod text;

pub use save::*;
pub use session::*;
pub use text::overlay_text;
