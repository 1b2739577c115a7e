//! EpicShot Common Utilities
//!
//! Shared infrastructure for all EpicShot crates:
//! - Error taxonomy and result aliases
//! - Wall clock used to stamp overlay text
//! - Cooperative cancellation between superseded requests
//! - Tracing/logging initialization
//! - Configuration loading

pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use cancel::*;
pub use clock::*;
pub use config::*;
pub use error::*;
