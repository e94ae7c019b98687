//! Perlin noise-based elevation generation.

use noise::{NoiseFn, Perlin};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use trackfix::models::Position;

/// Generates elevation data using multiple octaves of Perlin noise, giving
/// large-scale hills with small-scale variation on top.
#[derive(Debug, Clone)]
pub struct ElevationGenerator {
    perlin: Perlin,
    /// Base elevation in meters (e.g., valley floor).
    base_elevation: f64,
    /// Scale factor for terrain height variation.
    height_scale: f64,
    /// Spatial frequency in cycles per degree.
    frequency: f64,
    octaves: u32,
}

impl ElevationGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            base_elevation: 1650.0,
            height_scale: 150.0,
            frequency: 40.0,
            octaves: 4,
        }
    }

    /// Sierra Nevada style terrain: high base, large relief.
    pub fn mountains(seed: u32) -> Self {
        Self {
            base_elevation: 1900.0,
            height_scale: 400.0,
            frequency: 30.0,
            octaves: 5,
            ..Self::new(seed)
        }
    }

    /// Rolling hills near sea level. Dips below zero are possible, which
    /// exercises negative elevations in the statistics.
    pub fn coastal(seed: u32) -> Self {
        Self {
            base_elevation: 10.0,
            height_scale: 25.0,
            frequency: 60.0,
            octaves: 2,
            ..Self::new(seed)
        }
    }

    pub fn with_base_elevation(mut self, elevation: f64) -> Self {
        self.base_elevation = elevation;
        self
    }

    pub fn with_height_scale(mut self, scale: f64) -> Self {
        self.height_scale = scale;
        self
    }

    pub fn range(&self) -> (f64, f64) {
        (
            self.base_elevation - self.height_scale,
            self.base_elevation + self.height_scale,
        )
    }

    /// Elevation at a position, from fractal Brownian motion.
    pub fn elevation_at(&self, position: Position) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.frequency;
        let mut max_amplitude = 0.0;

        for _ in 0..self.octaves {
            let noise_val = self
                .perlin
                .get([position.lat * frequency, position.lon * frequency]);
            total += noise_val * amplitude;
            max_amplitude += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        let normalized = total / max_amplitude; // Range: -1 to 1
        self.base_elevation + (normalized * self.height_scale)
    }

    pub fn elevation_profile(&self, path: &[Position]) -> Vec<f64> {
        path.iter().map(|p| self.elevation_at(*p)).collect()
    }
}

/// Barometric/GPS elevation noise. Real devices read within ±3-20 m.
pub fn add_elevation_jitter(elevation: f64, rng: &mut impl Rng, std_dev: f64) -> f64 {
    match Normal::new(0.0, std_dev) {
        Ok(normal) => elevation + normal.sample(rng),
        Err(_) => elevation,
    }
}
