//! Configuration types for test data generation.

use serde::{Deserialize, Serialize};
use trackfix::models::Position;

/// Geographic bounding box defined by southwest and northeast corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum latitude (south)
    pub min_lat: f64,
    /// Minimum longitude (west)
    pub min_lon: f64,
    /// Maximum latitude (north)
    pub max_lat: f64,
    /// Maximum longitude (east)
    pub max_lon: f64,
}

impl BoundingBox {
    pub const fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Returns a random point within the bounding box.
    pub fn random_point(&self, rng: &mut impl rand::Rng) -> Position {
        let lat = rng.gen_range(self.min_lat..self.max_lat);
        let lon = rng.gen_range(self.min_lon..self.max_lon);
        Position::new(lat, lon)
    }

    pub fn center(&self) -> Position {
        Position::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// Pre-defined geographic regions for test data generation.
#[derive(Debug, Clone, Copy)]
pub struct Region;

impl Region {
    /// Reno/Tahoe area - mountain trails with significant elevation changes.
    pub const RENO_TAHOE: BoundingBox = BoundingBox::new(39.0, -120.5, 39.6, -119.5);

    /// Boulder, CO area - popular fitness trails with varied terrain.
    pub const BOULDER: BoundingBox = BoundingBox::new(39.9, -105.5, 40.1, -105.2);

    /// Hakone, Japan - far from UTC, for local-time checks.
    pub const HAKONE: BoundingBox = BoundingBox::new(35.18, 138.98, 35.28, 139.12);
}

/// Which athletic profile records the activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    #[default]
    Running,
    Cycling,
}

/// Settings for one generated scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub seed: u64,
    pub region: BoundingBox,
    pub sport: Sport,
    /// Length of the planned route in meters.
    pub distance_meters: f64,
    /// Number of laps the recording is split into.
    pub laps: usize,
    /// Keep every n-th path vertex in the planned route.
    pub route_stride: usize,
    /// POIs placed beside the route, at `poi_offset_m`.
    pub near_pois: usize,
    /// POIs placed well away from the route.
    pub far_pois: usize,
    pub poi_offset_m: f64,
    /// Probability that a recorded point has no GPS fix.
    pub fix_loss_probability: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            region: Region::BOULDER,
            sport: Sport::Running,
            distance_meters: 5000.0,
            laps: 1,
            route_stride: 10,
            near_pois: 4,
            far_pois: 6,
            poi_offset_m: 40.0,
            fix_loss_probability: 0.0,
        }
    }
}
