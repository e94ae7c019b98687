//! Fluent builder for constructing test scenarios.

use std::f64::consts::FRAC_PI_2;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use time::OffsetDateTime;
use tracing::debug;
use trackfix::models::{
    Activity, GpxDocument, GpxMetadata, GpxTrack, Lap, Position, Route, TcxDocument, Track,
    TrackPoint, Waypoint,
};

use crate::config::{BoundingBox, ScenarioConfig, Sport};
use crate::profiles::{AthleteProfile, CyclistProfile, RunnerProfile};
use crate::sources::{ProceduralGenerator, offset_position};

/// A generated activity with the documents the engine consumes.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub config: ScenarioConfig,
    /// The path the athlete actually followed, without noise.
    pub path: Vec<Position>,
    /// What the device recorded along `path`.
    pub recording: Vec<TrackPoint>,
    /// Names of the POIs placed beside the route.
    pub near_poi_names: Vec<String>,
    pois: Vec<Waypoint>,
}

impl Scenario {
    pub fn start_time(&self) -> Option<OffsetDateTime> {
        self.recording.iter().find_map(|p| p.time)
    }

    pub fn end_time(&self) -> Option<OffsetDateTime> {
        self.recording.iter().rev().find_map(|p| p.time)
    }

    /// The recording as a TCX activity, split into equal laps. Lap figures
    /// are left empty for the recalculator.
    pub fn recorded_tcx(&self) -> TcxDocument {
        let per_lap = self.recording.len().div_ceil(self.config.laps.max(1)).max(1);
        let laps = self
            .recording
            .chunks(per_lap)
            .map(|chunk| Lap::with_tracks(vec![Track::new(chunk.to_vec())]))
            .collect();
        TcxDocument {
            author: Some("Polar ProTrainer".to_string()),
            activities: vec![Activity {
                sport: Some(sport_name(self.config.sport).to_string()),
                creator: Some("Polar V800".to_string()),
                laps,
                ..Default::default()
            }],
        }
    }

    /// The recording as a GPX track without heart rate or cadence, as a phone
    /// app logging position only would write it.
    pub fn recorded_gpx(&self) -> GpxDocument {
        let points = self
            .recording
            .iter()
            .filter(|p| p.position.is_some())
            .map(|p| TrackPoint {
                heart_rate: None,
                cadence: None,
                ..p.clone()
            })
            .collect();
        GpxDocument {
            creator: Some("SportsTrackLive".to_string()),
            tracks: vec![GpxTrack::with_segments(vec![Track::new(points)])],
            ..Default::default()
        }
    }

    /// Every `route_stride`-th path vertex as a GPX route, always including
    /// both ends.
    pub fn planned_route(&self) -> GpxDocument {
        let stride = self.config.route_stride.max(1);
        let mut points: Vec<Waypoint> = self
            .path
            .iter()
            .step_by(stride)
            .map(|p| Waypoint::new(p.lat, p.lon))
            .collect();
        if (self.path.len() - 1) % stride != 0 {
            if let Some(last) = self.path.last() {
                points.push(Waypoint::new(last.lat, last.lon));
            }
        }
        GpxDocument {
            creator: Some("GPX Inspector".to_string()),
            metadata: GpxMetadata {
                name: Some("Planned".to_string()),
                ..Default::default()
            },
            routes: vec![Route {
                name: Some("Planned".to_string()),
                points,
            }],
            ..Default::default()
        }
    }

    pub fn pois(&self) -> GpxDocument {
        GpxDocument {
            creator: Some("MapSource".to_string()),
            waypoints: self.pois.clone(),
            ..Default::default()
        }
    }
}

fn sport_name(sport: Sport) -> &'static str {
    match sport {
        Sport::Running => RunnerProfile::default().sport(),
        Sport::Cycling => CyclistProfile::default().sport(),
    }
}

/// Builder for creating complete test scenarios.
///
/// # Example
///
/// ```rust,ignore
/// let scenario = ScenarioBuilder::new()
///     .with_region(Region::BOULDER)
///     .with_distance(3000.0)
///     .with_laps(2)
///     .with_pois(3, 5)
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScenarioBuilder {
    config: ScenarioConfig,
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ScenarioConfig) -> Self {
        Self { config }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn with_region(mut self, region: BoundingBox) -> Self {
        self.config.region = region;
        self
    }

    pub fn with_sport(mut self, sport: Sport) -> Self {
        self.config.sport = sport;
        self
    }

    pub fn with_distance(mut self, meters: f64) -> Self {
        self.config.distance_meters = meters;
        self
    }

    pub fn with_laps(mut self, laps: usize) -> Self {
        self.config.laps = laps;
        self
    }

    pub fn with_route_stride(mut self, stride: usize) -> Self {
        self.config.route_stride = stride;
        self
    }

    /// Number of POIs beside the route and far from it.
    pub fn with_pois(mut self, near: usize, far: usize) -> Self {
        self.config.near_pois = near;
        self.config.far_pois = far;
        self
    }

    pub fn with_poi_offset(mut self, meters: f64) -> Self {
        self.config.poi_offset_m = meters;
        self
    }

    pub fn with_fix_loss(mut self, probability: f64) -> Self {
        self.config.fix_loss_probability = probability;
        self
    }

    /// Generates the scenario. The same config always yields the same data.
    pub fn build(self) -> Scenario {
        let config = self.config;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let profile: Box<dyn AthleteProfile> = match config.sport {
            Sport::Running => Box::new(RunnerProfile::default()),
            Sport::Cycling => Box::new(CyclistProfile::default()),
        };

        let generator = ProceduralGenerator::for_region(config.region, config.seed as u32)
            .with_distance(config.distance_meters)
            .with_fix_loss(config.fix_loss_probability);
        let path = generator.generate_path(&mut rng);
        let recording = generator.record(&path, profile.as_ref(), &mut rng);

        let (pois, near_poi_names) = place_pois(&path, &config, &mut rng);

        debug!(
            vertices = path.len(),
            points = recording.len(),
            pois = pois.len(),
            "Built scenario"
        );
        Scenario {
            config,
            path,
            recording,
            near_poi_names,
            pois,
        }
    }
}

/// Near POIs sit `poi_offset_m` to the side of evenly spaced path vertices.
/// Far POIs sit at least 5 km outside the region.
fn place_pois(
    path: &[Position],
    config: &ScenarioConfig,
    rng: &mut impl Rng,
) -> (Vec<Waypoint>, Vec<String>) {
    let mut pois = Vec::new();
    let mut near_names = Vec::new();

    if path.len() >= 2 {
        for i in 0..config.near_pois {
            let index = 1 + i * (path.len() - 2) / config.near_pois.max(1);
            let (a, b) = (path[index - 1], path[index]);
            let heading = (b.lon - a.lon).atan2(b.lat - a.lat);
            let side = if rng.gen_bool(0.5) { FRAC_PI_2 } else { -FRAC_PI_2 };
            let at = offset_position(b, heading + side, config.poi_offset_m);
            let name = format!("Near {i}");
            pois.push(Waypoint::new(at.lat, at.lon).named(name.clone()));
            near_names.push(name);
        }
    }

    let outside = config.region.center();
    for i in 0..config.far_pois {
        let heading = rng.gen_range(0.0..std::f64::consts::TAU);
        let at = offset_position(outside, heading, rng.gen_range(60_000.0..90_000.0));
        pois.push(Waypoint::new(at.lat, at.lon).named(format!("Far {i}")));
    }

    (pois, near_names)
}
