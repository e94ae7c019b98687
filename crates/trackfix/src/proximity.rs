//! Finds points of interest near the tracks and routes of a GPX document.
//!
//! Each polyline segment is densified with samples no farther apart than a
//! fraction of the search radius, so a POI beside the middle of a long
//! straight segment is found even when both vertices are out of range.

use std::fmt;

use tracing::{debug, info};

use crate::errors::{Result, TrackError};
use crate::models::{GpxDocument, Outcome, Position, Waypoint};
use crate::units::DistanceQuantity;

#[derive(Debug, Clone, PartialEq)]
pub struct ProximityResult {
    /// Matched POIs in the order they were found.
    pub found: Vec<Waypoint>,
    pub total_pois: usize,
    pub tracks: usize,
    pub routes: usize,
    pub radius: DistanceQuantity,
}

impl ProximityResult {
    /// A GPX document holding only the matched POIs as waypoints.
    pub fn to_gpx(&self, creator: &str) -> GpxDocument {
        GpxDocument {
            creator: Some(creator.to_string()),
            waypoints: self.found.clone(),
            ..Default::default()
        }
    }
}

impl fmt::Display for ProximityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " Out of {} POIs found {} POIs within {} of {} tracks and {} routes",
            self.total_pois,
            self.found.len(),
            self.radius,
            self.tracks,
            self.routes
        )
    }
}

/// Sample positions along the segment from `near` to `far`, starting at `far`
/// and stepping back by `step` meters until `near` is reached. Both ends are
/// always included.
pub fn segment_samples(near: Position, far: Position, step: f64) -> Vec<Position> {
    let length = near.distance_to(&far);
    if length == 0.0 || step <= 0.0 {
        return vec![far];
    }

    let mut samples = Vec::new();
    let mut along = length;
    loop {
        samples.push(near.lerp(&far, along / length));
        if along == 0.0 {
            break;
        }
        along = (along - step).max(0.0);
    }
    samples
}

struct Search {
    remaining: Vec<Waypoint>,
    found: Vec<Waypoint>,
    radius_m: f64,
    step_m: f64,
}

impl Search {
    fn test(&mut self, at: Position) {
        let radius = self.radius_m;
        let (hits, rest): (Vec<Waypoint>, Vec<Waypoint>) = std::mem::take(&mut self.remaining)
            .into_iter()
            .partition(|poi| at.distance_to(&poi.position) <= radius);
        self.remaining = rest;
        self.found.extend(hits);
    }

    fn walk(&mut self, polyline: impl IntoIterator<Item = Position>) {
        let mut prev: Option<Position> = None;
        for vertex in polyline {
            if self.remaining.is_empty() {
                return;
            }
            match prev {
                Some(near) => {
                    for at in segment_samples(near, vertex, self.step_m) {
                        self.test(at);
                    }
                }
                None => self.test(vertex),
            }
            prev = Some(vertex);
        }
    }
}

/// Collects every POI of `pois` within `radius` of any track segment or
/// route of `route`, each at most once.
///
/// `radius` is `None` when the distance prompt was cancelled.
pub fn find_pois_near(
    route: &GpxDocument,
    pois: &GpxDocument,
    radius: Option<DistanceQuantity>,
    interp_distance_factor: f64,
) -> Result<Outcome<ProximityResult>> {
    let Some(radius) = radius else {
        return Ok(Outcome::Aborted);
    };
    let radius_m = radius.meters();
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(TrackError::NonPositiveDistance(radius_m));
    }
    if pois.waypoints.is_empty() {
        return Err(TrackError::NoPois);
    }

    let mut search = Search {
        remaining: pois.waypoints.clone(),
        found: Vec::new(),
        radius_m,
        step_m: interp_distance_factor * radius_m,
    };

    for segment in route.tracks.iter().flat_map(|t| t.segments.iter()) {
        search.walk(segment.points.iter().filter_map(|p| p.position));
    }
    for rte in &route.routes {
        search.walk(rte.points.iter().map(|w| w.position));
    }

    let total_pois = pois.waypoints.len();
    if search.found.is_empty() {
        return Err(TrackError::NoPoisFound {
            total: total_pois,
            radius: radius.to_string(),
        });
    }

    debug!(
        remaining = search.remaining.len(),
        step_m = search.step_m,
        "Proximity search finished"
    );
    let result = ProximityResult {
        found: search.found,
        total_pois,
        tracks: route.tracks.len(),
        routes: route.routes.len(),
        radius,
    };
    info!(
        found = result.found.len(),
        total = total_pois,
        "Found POIs near tracks"
    );
    Ok(Outcome::Completed(result))
}
