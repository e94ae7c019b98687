//! Terrain generation utilities.
//!
//! Elevation profiles come from Perlin noise so generated tracks have
//! realistic climbs and descents.

mod elevation;

pub use elevation::{ElevationGenerator, add_elevation_jitter};
