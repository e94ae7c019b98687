//! Data acquisition sources for track generation.
//!
//! [`ProceduralGenerator`] produces synthetic paths and recordings with
//! configurable geometry, timing and sensor behaviour.

mod procedural;

pub use procedural::{ProceduralGenerator, TrackConfig, offset_position};
