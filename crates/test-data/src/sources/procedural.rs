//! Procedural track generation.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use time::{Duration, OffsetDateTime};
use time::macros::datetime;
use trackfix::geodesy::EARTH_RADIUS_M;
use trackfix::models::{Position, TrackPoint};

use crate::config::{BoundingBox, Region};
use crate::profiles::{self, AthleteProfile};
use crate::terrain::{ElevationGenerator, add_elevation_jitter};

/// Configuration for procedural track generation.
#[derive(Debug, Clone)]
pub struct TrackConfig {
    /// Target distance in meters.
    pub distance_meters: f64,
    /// Starting point. If None, random within bounds.
    pub start_point: Option<Position>,
    /// Geographic bounds for the track.
    pub bounds: BoundingBox,
    /// Time of the first recorded point.
    pub start_time: OffsetDateTime,
    /// GPS position jitter standard deviation in meters.
    pub gps_jitter_m: f64,
    /// GPS elevation jitter standard deviation in meters.
    pub elevation_jitter_m: f64,
    /// Approximate distance between track points in meters.
    pub point_spacing_m: f64,
    /// Probability of inserting a pause (0.0 - 1.0).
    pub pause_probability: f64,
    /// Duration range for pauses (min, max) in seconds.
    pub pause_duration_range: (f64, f64),
    /// Probability that a recorded point has no GPS fix.
    pub fix_loss_probability: f64,
    /// Heart-rate response time constant in seconds.
    pub heart_rate_lag_secs: f64,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            distance_meters: 5000.0,
            start_point: None,
            bounds: Region::BOULDER,
            start_time: datetime!(2024-05-18 14:30:00 UTC),
            gps_jitter_m: 3.0,
            elevation_jitter_m: 5.0,
            point_spacing_m: 10.0,
            pause_probability: 0.02,
            pause_duration_range: (30.0, 180.0),
            fix_loss_probability: 0.0,
            heart_rate_lag_secs: 30.0,
        }
    }
}

fn normal(std_dev: f64) -> Option<Normal<f64>> {
    Normal::new(0.0, std_dev).ok().filter(|_| std_dev > 0.0)
}

/// Offsets a position by a distance in meters along a heading in radians
/// (0 is north, clockwise).
pub fn offset_position(from: Position, heading: f64, meters: f64) -> Position {
    let angular = meters / EARTH_RADIUS_M;
    Position::new(
        from.lat + (angular * heading.cos()).to_degrees(),
        from.lon + (angular * heading.sin() / from.lat.to_radians().cos()).to_degrees(),
    )
}

/// Generates synthetic GPS tracks with realistic characteristics.
#[derive(Debug, Clone)]
pub struct ProceduralGenerator {
    config: TrackConfig,
    elevation: ElevationGenerator,
}

impl ProceduralGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            config: TrackConfig::default(),
            elevation: ElevationGenerator::new(seed),
        }
    }

    pub fn for_region(bounds: BoundingBox, seed: u32) -> Self {
        let elevation = if bounds.center().lat > 39.5 {
            ElevationGenerator::new(seed)
        } else {
            ElevationGenerator::mountains(seed)
        };

        Self {
            config: TrackConfig {
                bounds,
                ..Default::default()
            },
            elevation,
        }
    }

    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    pub fn with_config(mut self, config: TrackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_distance(mut self, meters: f64) -> Self {
        self.config.distance_meters = meters;
        self
    }

    pub fn with_start(mut self, position: Position) -> Self {
        self.config.start_point = Some(position);
        self
    }

    pub fn with_start_time(mut self, time: OffsetDateTime) -> Self {
        self.config.start_time = time;
        self
    }

    pub fn with_gps_jitter(mut self, meters: f64) -> Self {
        self.config.gps_jitter_m = meters;
        self
    }

    pub fn with_elevation(mut self, elevation: ElevationGenerator) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn with_point_spacing(mut self, meters: f64) -> Self {
        self.config.point_spacing_m = meters;
        self
    }

    pub fn with_pauses(mut self, probability: f64, min_sec: f64, max_sec: f64) -> Self {
        self.config.pause_probability = probability;
        self.config.pause_duration_range = (min_sec, max_sec);
        self
    }

    pub fn with_fix_loss(mut self, probability: f64) -> Self {
        self.config.fix_loss_probability = probability;
        self
    }

    /// Generates a path, then records it with the given athletic profile.
    pub fn generate(&self, profile: &dyn AthleteProfile, rng: &mut impl Rng) -> Vec<TrackPoint> {
        let path = self.generate_path(rng);
        self.record(&path, profile, rng)
    }

    /// A random walk with some heading momentum, kept inside the bounds.
    pub fn generate_path(&self, rng: &mut impl Rng) -> Vec<Position> {
        let start = self
            .config
            .start_point
            .unwrap_or_else(|| self.config.bounds.random_point(rng));
        let mut path = vec![start];
        let mut current = start;
        let mut total_distance = 0.0;
        let mut heading = rng.gen_range(0.0..std::f64::consts::TAU);

        while total_distance < self.config.distance_meters {
            heading += rng.gen_range(-0.3..0.3);
            let step = self.config.point_spacing_m * rng.gen_range(0.8..1.2);

            let next = offset_position(current, heading, step);
            let (next, bounced_heading) = self.apply_bounds(next, heading);
            heading = bounced_heading;

            total_distance += current.distance_to(&next);
            current = next;
            path.push(current);
        }

        path
    }

    /// Applies bounds checking with heading reversal.
    fn apply_bounds(&self, p: Position, heading: f64) -> (Position, f64) {
        let b = &self.config.bounds;
        let mut new_heading = heading;

        let lat = if p.lat < b.min_lat {
            new_heading = std::f64::consts::PI - heading;
            b.min_lat + (b.min_lat - p.lat).min(0.001)
        } else if p.lat > b.max_lat {
            new_heading = std::f64::consts::PI - heading;
            b.max_lat - (p.lat - b.max_lat).min(0.001)
        } else {
            p.lat
        };

        let lon = if p.lon < b.min_lon {
            new_heading = -heading;
            b.min_lon + (b.min_lon - p.lon).min(0.001)
        } else if p.lon > b.max_lon {
            new_heading = -heading;
            b.max_lon - (p.lon - b.max_lon).min(0.001)
        } else {
            p.lon
        };

        (Position::new(lat, lon), new_heading)
    }

    fn sample(
        &self,
        rng: &mut impl Rng,
        jitter: Option<&Normal<f64>>,
        at: Position,
        time: OffsetDateTime,
        heart_rate: f64,
        cadence: u16,
    ) -> TrackPoint {
        let elevation = add_elevation_jitter(
            self.elevation.elevation_at(at),
            rng,
            self.config.elevation_jitter_m,
        );
        let mut point = TrackPoint::new(at.lat, at.lon)
            .with_time(time)
            .with_elevation(elevation)
            .with_heart_rate(heart_rate.round() as u16)
            .with_cadence(cadence);
        if let (Some(jitter), Some(p)) = (jitter, point.position.as_mut()) {
            p.lat += jitter.sample(rng);
            p.lon += jitter.sample(rng);
        }
        if rng.r#gen::<f64>() < self.config.fix_loss_probability {
            point.position = None;
        }
        point
    }

    /// Records a path as a device would: noisy positions and elevations,
    /// timestamps from the profile's speed at each grade, a lagging heart
    /// rate and cadence.
    pub fn record(
        &self,
        path: &[Position],
        profile: &dyn AthleteProfile,
        rng: &mut impl Rng,
    ) -> Vec<TrackPoint> {
        let Some(&first) = path.first() else {
            return Vec::new();
        };

        let jitter = normal(self.config.gps_jitter_m / 111_000.0);
        let (rest, _) = profile.heart_rate_range();

        let mut result = Vec::with_capacity(path.len());
        let mut timestamp = self.config.start_time;
        let mut heart_rate = rest + 20.0;

        result.push(self.sample(rng, jitter.as_ref(), first, timestamp, heart_rate, 0));

        for pair in path.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);

            let distance = prev.distance_to(&curr);
            let grade = if distance > 0.0 {
                (self.elevation.elevation_at(curr) - self.elevation.elevation_at(prev)) / distance
            } else {
                0.0
            };

            let variance = profiles::sample_variance(profile, rng);
            let speed = profiles::speed_at_grade(profile, grade, variance);
            let moving_secs = distance / speed;

            let pause_secs = if rng.r#gen::<f64>() < self.config.pause_probability {
                let (min, max) = self.config.pause_duration_range;
                rng.gen_range(min..max)
            } else {
                0.0
            };

            // Heart rate recovers while paused, then responds to the effort.
            heart_rate = profiles::lagged_heart_rate(
                heart_rate,
                rest,
                pause_secs,
                self.config.heart_rate_lag_secs,
            );
            heart_rate = profiles::lagged_heart_rate(
                heart_rate,
                profiles::target_heart_rate(profile, speed, grade),
                moving_secs,
                self.config.heart_rate_lag_secs,
            );

            timestamp += Duration::seconds_f64(moving_secs + pause_secs);
            result.push(self.sample(
                rng,
                jitter.as_ref(),
                curr,
                timestamp,
                heart_rate,
                profile.cadence_at(speed),
            ));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::{CyclistProfile, RunnerProfile};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_generate_track() {
        let track_gen = ProceduralGenerator::new(42).with_distance(1000.0);
        let profile = RunnerProfile::default();
        let mut rng = StdRng::seed_from_u64(42);

        let track = track_gen.generate(&profile, &mut rng);

        assert!(track.len() > 10);
        for point in &track {
            assert!(point.time.is_some());
            assert!(point.elevation.is_some());
            assert!(point.position.is_some());
            assert!(point.heart_rate_bpm().is_some());
        }
        assert_eq!(track[0].time, Some(track_gen.config().start_time));
    }

    #[test]
    fn test_timestamps_increase() {
        let track_gen = ProceduralGenerator::new(42).with_distance(500.0);
        let profile = CyclistProfile::default();
        let mut rng = StdRng::seed_from_u64(9);

        let track = track_gen.generate(&profile, &mut rng);

        for window in track.windows(2) {
            assert!(window[1].time > window[0].time, "Timestamps should increase");
        }
    }

    #[test]
    fn test_path_length_and_bounds() {
        let track_gen = ProceduralGenerator::for_region(Region::RENO_TAHOE, 5).with_distance(2000.0);
        let mut rng = StdRng::seed_from_u64(5);
        let path = track_gen.generate_path(&mut rng);

        let length: f64 = path.windows(2).map(|w| w[0].distance_to(&w[1])).sum();
        assert!(length >= 2000.0);
        assert!(length < 2000.0 + 2.0 * track_gen.config().point_spacing_m);
        let b = Region::RENO_TAHOE;
        assert!(path.iter().all(|p| p.lat >= b.min_lat && p.lat <= b.max_lat));
    }

    #[test]
    fn test_fix_loss_drops_positions() {
        let track_gen = ProceduralGenerator::new(1)
            .with_distance(1000.0)
            .with_fix_loss(0.5);
        let mut rng = StdRng::seed_from_u64(11);
        let track = track_gen.generate(&RunnerProfile::default(), &mut rng);
        let lost = track.iter().filter(|p| p.position.is_none()).count();
        assert!(lost > 0 && lost < track.len());
        assert!(track.iter().all(|p| p.time.is_some()));
    }

    #[test]
    fn test_offset_position() {
        let origin = Position::new(40.0, -105.0);
        let east = offset_position(origin, std::f64::consts::FRAC_PI_2, 500.0);
        assert!((origin.distance_to(&east) - 500.0).abs() < 1.0);
        assert!((east.lat - origin.lat).abs() < 1e-9);
    }
}
