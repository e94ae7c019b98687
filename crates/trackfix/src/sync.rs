//! Aligns a route's geometry onto the time axis of a recorded activity.
//!
//! The route (a GPX file with no useful timestamps) is reduced to a table of
//! vertices indexed by cumulative distance. A start and end trackpoint of the
//! activity are chosen by an ordered list of matching strategies, and each
//! trackpoint between them is moved to the route position reached at that
//! point's share of the elapsed time, assuming a constant average speed.

use std::fmt;

use time::macros::format_description;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::config::DeviceProfile;
use crate::errors::{Result, TrackError};
use crate::models::{GpxDocument, Outcome, Position, TcxDocument, TimeWindow, Track};
use crate::recalc::recalculate;
use crate::units::{M2MI, MPS2MPH, format_duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolateMode {
    /// Match the route's first and last vertices to the nearest trackpoints.
    MatchLatLon,
    /// Use the first and last trackpoints inside the window as they are.
    UseInterval,
}

impl fmt::Display for InterpolateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpolateMode::MatchLatLon => f.write_str("MatchLatLon"),
            InterpolateMode::UseInterval => f.write_str("UseInterval"),
        }
    }
}

/// A route vertex with its distance from the start of the route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLonSample {
    pub position: Position,
    pub cumulative_distance: f64,
    pub time: Option<OffsetDateTime>,
}

/// Route vertices of every track segment and then every route, in order.
/// Distance is not accumulated across the gap between two polylines.
pub fn route_table(route: &GpxDocument) -> Vec<LatLonSample> {
    let segments = route
        .tracks
        .iter()
        .flat_map(|t| t.segments.iter())
        .map(|s| {
            s.points
                .iter()
                .filter_map(|p| p.position.map(|pos| (pos, p.time)))
                .collect::<Vec<_>>()
        });
    let routes = route
        .routes
        .iter()
        .map(|r| r.points.iter().map(|w| (w.position, w.time)).collect::<Vec<_>>());

    let mut table = Vec::new();
    let mut total = 0.0;
    for polyline in segments.chain(routes) {
        let mut prev: Option<Position> = None;
        for (position, time) in polyline {
            if let Some(prev) = prev {
                total += prev.distance_to(&position);
            }
            table.push(LatLonSample {
                position,
                cumulative_distance: total,
                time,
            });
            prev = Some(position);
        }
    }
    table
}

/// Route position at cumulative distance `d`, linear within the bracketing
/// pair of vertices.
pub fn position_at_distance(table: &[LatLonSample], d: f64) -> Option<Position> {
    let first = table.first()?;
    let last = table.last()?;
    let j = table.partition_point(|s| s.cumulative_distance < d);
    if j == 0 {
        return Some(first.position);
    }
    if j == table.len() {
        return Some(last.position);
    }

    let (a, b) = (&table[j - 1], &table[j]);
    let span = b.cumulative_distance - a.cumulative_distance;
    if span <= 0.0 {
        return Some(a.position);
    }
    let ratio = (d - a.cumulative_distance) / span;
    Some(a.position.lerp(&b.position, ratio))
}

/// Inclusive trackpoint index range chosen for the rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRange {
    pub first: usize,
    pub last: usize,
}

/// What one pass over the activity track found inside the window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EndpointScan {
    pub in_window: usize,
    pub first_in_window: Option<usize>,
    pub last_in_window: Option<usize>,
    pub first_positioned: Option<usize>,
    /// Closest to the route's first vertex; the earliest wins ties.
    pub nearest_first: Option<usize>,
    /// Closest to the route's last vertex; the latest wins ties.
    pub nearest_last: Option<usize>,
}

impl EndpointScan {
    pub fn run(
        track: &Track,
        window: &TimeWindow,
        route_first: Position,
        route_last: Position,
    ) -> Self {
        let mut scan = Self::default();
        let mut best_first = f64::MAX;
        let mut best_last = f64::MAX;

        for (index, point) in track.points.iter().enumerate() {
            if !point.time.is_some_and(|t| window.contains(t)) {
                continue;
            }
            scan.in_window += 1;
            scan.first_in_window.get_or_insert(index);
            scan.last_in_window = Some(index);

            let Some(position) = point.position else {
                continue;
            };
            scan.first_positioned.get_or_insert(index);

            let d = position.distance_to(&route_first);
            if d < best_first {
                best_first = d;
                scan.nearest_first = Some(index);
            }
            let d = position.distance_to(&route_last);
            if d <= best_last {
                best_last = d;
                scan.nearest_last = Some(index);
            }
        }
        scan
    }
}

/// Why a strategy declined to produce a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyWindow,
    NoFirstMatch,
    NoLastMatch,
    /// The first match comes after the last one.
    OutOfOrder(MatchRange),
}

impl From<Rejection> for TrackError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::EmptyWindow => TrackError::NoPointsInWindow,
            Rejection::NoFirstMatch | Rejection::OutOfOrder(_) => TrackError::NoFirstMatch,
            Rejection::NoLastMatch => TrackError::NoLastMatch,
        }
    }
}

pub type MatchStrategy = fn(&EndpointScan) -> std::result::Result<MatchRange, Rejection>;

fn nearest_endpoints(scan: &EndpointScan) -> std::result::Result<MatchRange, Rejection> {
    if scan.in_window == 0 {
        return Err(Rejection::EmptyWindow);
    }
    let first = scan.nearest_first.ok_or(Rejection::NoFirstMatch)?;
    let last = scan.nearest_last.ok_or(Rejection::NoLastMatch)?;
    let range = MatchRange { first, last };
    if first > last {
        return Err(Rejection::OutOfOrder(range));
    }
    Ok(range)
}

fn first_positioned_start(scan: &EndpointScan) -> std::result::Result<MatchRange, Rejection> {
    if scan.in_window == 0 {
        return Err(Rejection::EmptyWindow);
    }
    let first = scan.first_positioned.ok_or(Rejection::NoFirstMatch)?;
    let last = scan.nearest_last.ok_or(Rejection::NoLastMatch)?;
    Ok(MatchRange { first, last })
}

fn window_bounds(scan: &EndpointScan) -> std::result::Result<MatchRange, Rejection> {
    match (scan.first_in_window, scan.last_in_window) {
        (Some(first), Some(last)) => Ok(MatchRange { first, last }),
        _ => Err(Rejection::EmptyWindow),
    }
}

const MATCH_LAT_LON: &[(&str, MatchStrategy)] = &[
    ("nearest endpoints", nearest_endpoints),
    ("first positioned start", first_positioned_start),
];

const USE_INTERVAL: &[(&str, MatchStrategy)] = &[("window bounds", window_bounds)];

impl InterpolateMode {
    /// Strategies tried in order until one yields a range.
    pub fn strategies(self) -> &'static [(&'static str, MatchStrategy)] {
        match self {
            InterpolateMode::MatchLatLon => MATCH_LAT_LON,
            InterpolateMode::UseInterval => USE_INTERVAL,
        }
    }
}

pub fn resolve_range(mode: InterpolateMode, scan: &EndpointScan) -> Result<MatchRange> {
    let mut rejection = Rejection::EmptyWindow;
    for &(name, strategy) in mode.strategies() {
        match strategy(scan) {
            Ok(range) => {
                debug!(strategy = name, ?range, "Matched trackpoint range");
                return Ok(range);
            }
            Err(reason) => {
                warn!(strategy = name, ?reason, "Matching strategy declined");
                rejection = reason;
            }
        }
    }
    Err(rejection.into())
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub mode: InterpolateMode,
    pub range: MatchRange,
    pub first_time: OffsetDateTime,
    pub last_time: OffsetDateTime,
    /// Meters.
    pub route_distance: f64,
    pub duration: Duration,
    pub points_updated: usize,
}

impl SyncReport {
    /// Meters per second.
    pub fn average_speed(&self) -> f64 {
        self.route_distance / self.duration.as_seconds_f64()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_u = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]Z");
        let t0 = self.first_time.format(fmt_u).map_err(|_| fmt::Error)?;
        let t1 = self.last_time.format(fmt_u).map_err(|_| fmt::Error)?;
        writeln!(
            f,
            "Matched from trackpoint {} to {} [{t0} to {t1}]",
            self.range.first, self.range.last
        )?;
        write!(
            f,
            "  Distance={:.2} mi Duration={} Speed={:.2} mph Mode={}",
            M2MI * self.route_distance,
            format_duration(self.duration),
            MPS2MPH * self.average_speed(),
            self.mode
        )
    }
}

/// Rewrites the positions of the first track of the first lap of the first
/// activity from `route`, then recalculates the summary fields.
///
/// `window` bounds which trackpoints may be matched; `None` means the window
/// prompt was cancelled and nothing is done. On failure the document is left
/// untouched.
pub fn sync_route(
    tcx: &mut TcxDocument,
    route: &GpxDocument,
    window: Option<TimeWindow>,
    mode: InterpolateMode,
    device: &DeviceProfile,
) -> Result<Outcome<SyncReport>> {
    let Some(window) = window else {
        return Ok(Outcome::Aborted);
    };
    if tcx.activities.is_empty() {
        return Err(TrackError::NoActivities);
    }

    let table = route_table(route);
    let (Some(route_first), Some(route_last)) = (table.first(), table.last()) else {
        return Err(TrackError::RouteTooShort(table.len()));
    };
    if table.len() < 2 {
        return Err(TrackError::RouteTooShort(table.len()));
    }
    let total = route_last.cumulative_distance;

    let track = tcx.primary_track().ok_or(TrackError::NoTrackPoints)?;
    let scan = EndpointScan::run(track, &window, route_first.position, route_last.position);
    debug!(?scan, "Scanned activity track");
    let range = resolve_range(mode, &scan)?;

    let time_at = |i: usize| track.points.get(i).and_then(|p| p.time);
    let (Some(first_time), Some(last_time)) = (time_at(range.first), time_at(range.last)) else {
        return Err(TrackError::NoTimestamps);
    };
    let duration = last_time - first_time;
    if !duration.is_positive() {
        return Err(TrackError::ZeroDuration);
    }
    let span = duration.as_seconds_f64();

    let updates: Vec<(usize, Position)> = (range.first..=range.last)
        .filter_map(|i| {
            let point = &track.points[i];
            point.position?;
            let elapsed = (point.time? - first_time).as_seconds_f64();
            let d = (total * elapsed / span).clamp(0.0, total);
            position_at_distance(&table, d).map(|p| (i, p))
        })
        .collect();

    let report = SyncReport {
        mode,
        range,
        first_time,
        last_time,
        route_distance: total,
        duration,
        points_updated: updates.len(),
    };

    if let Some(track) = tcx.primary_track_mut() {
        for (i, position) in updates {
            track.points[i].position = Some(position);
        }
    }
    recalculate(tcx, device);

    info!(
        first = range.first,
        last = range.last,
        updated = report.points_updated,
        %mode,
        "Synchronized route onto activity"
    );
    Ok(Outcome::Completed(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::great_circle_distance;
    use crate::models::{Activity, GpxTrack, Lap, Route, TrackPoint, Waypoint};
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2022-08-20 07:30:00 UTC);

    fn at(secs: i64) -> OffsetDateTime {
        T0 + Duration::seconds(secs)
    }

    /// Degrees of latitude spanning `meters` on the nominal sphere.
    fn lat_for(meters: f64) -> f64 {
        (meters / crate::geodesy::EARTH_RADIUS_M).to_degrees()
    }

    fn route_along_meridian(meters: f64, vertices: usize) -> GpxDocument {
        let points = (0..vertices)
            .map(|i| {
                let frac = i as f64 / (vertices - 1) as f64;
                TrackPoint::new(lat_for(meters * frac), 0.0)
            })
            .collect();
        GpxDocument {
            tracks: vec![GpxTrack::with_segments(vec![Track::new(points)])],
            ..Default::default()
        }
    }

    /// Recorded activity with noisy positions near the route, one point per 10 s.
    fn recorded(secs: i64) -> TcxDocument {
        let points = (0..=secs / 10)
            .map(|i| {
                let t = i * 10;
                TrackPoint::new(lat_for(t as f64) + 0.00001, 0.00002).with_time(at(t))
            })
            .collect();
        TcxDocument {
            author: None,
            activities: vec![Activity {
                laps: vec![Lap::with_tracks(vec![Track::new(points)])],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_route_table_cumulative_and_gaps() {
        let gpx = GpxDocument {
            tracks: vec![GpxTrack::with_segments(vec![
                Track::new(vec![TrackPoint::new(0.0, 0.0), TrackPoint::new(0.001, 0.0)]),
                Track::new(vec![TrackPoint::new(1.0, 0.0), TrackPoint::new(1.001, 0.0)]),
            ])],
            routes: vec![Route {
                name: None,
                points: vec![Waypoint::new(2.0, 0.0)],
            }],
            ..Default::default()
        };
        let table = route_table(&gpx);
        let step = great_circle_distance(0.0, 0.0, 0.001, 0.0);
        let distances: Vec<f64> = table.iter().map(|s| s.cumulative_distance).collect();
        assert_eq!(distances.len(), 5);
        assert!((distances[1] - step).abs() < 1e-9);
        assert_eq!(distances[1], distances[2]);
        assert!((distances[3] - 2.0 * step).abs() < 1e-6);
        assert_eq!(distances[3], distances[4]);
    }

    #[test]
    fn test_scan_on_loop_route_ties() {
        // Start and finish coincide; the activity passes the same spot twice.
        let spot = Position::new(lat_for(10.0), 0.0);
        let track = Track::new(vec![
            TrackPoint::new(spot.lat, spot.lon).with_time(at(0)),
            TrackPoint::new(lat_for(300.0), 0.0).with_time(at(10)),
            TrackPoint::new(lat_for(300.0), 0.003).with_time(at(20)),
            TrackPoint::new(spot.lat, spot.lon).with_time(at(30)),
        ]);
        let start = Position::new(0.0, 0.0);

        let scan = EndpointScan::run(&track, &TimeWindow::new(at(0), at(30)), start, start);

        assert_eq!(scan.in_window, 4);
        assert_eq!(scan.nearest_first, Some(0));
        assert_eq!(scan.nearest_last, Some(3));
        assert_eq!(nearest_endpoints(&scan), Ok(MatchRange { first: 0, last: 3 }));
    }

    #[test]
    fn test_position_at_distance() {
        let table = route_table(&route_along_meridian(1000.0, 3));
        let mid = position_at_distance(&table, 250.0).unwrap();
        assert!((mid.lat - lat_for(250.0)).abs() < 1e-12);
        assert_eq!(position_at_distance(&table, -1.0), Some(table[0].position));
        assert_eq!(position_at_distance(&table, 5000.0), Some(table[2].position));
        assert_eq!(position_at_distance(&[], 1.0), None);
    }

    #[test]
    fn test_halfway_in_time_is_halfway_along_route() {
        let route = route_along_meridian(1000.0, 5);
        let mut tcx = recorded(1000);
        let window = TimeWindow::new(at(0), at(1000));

        let report = sync_route(
            &mut tcx,
            &route,
            Some(window),
            InterpolateMode::UseInterval,
            &DeviceProfile::neutral(),
        )
        .unwrap()
        .completed()
        .unwrap();

        assert_eq!(report.range, MatchRange { first: 0, last: 100 });
        assert!((report.route_distance - 1000.0).abs() < 1e-6);
        assert_eq!(report.duration, Duration::seconds(1000));
        assert_eq!(report.points_updated, 101);

        let table = route_table(&route);
        let expected = position_at_distance(&table, 500.0).unwrap();
        let at_500 = tcx.primary_track().unwrap().points[50].position.unwrap();
        assert!((at_500.lat - expected.lat).abs() < 1e-12);
        assert!((at_500.lon - expected.lon).abs() < 1e-12);
        assert!(at_500.distance_to(&expected) < 1e-6);
    }

    #[test]
    fn test_match_lat_lon_limits_range() {
        // Route covers only 200 m..800 m of the recorded path.
        let gpx = GpxDocument {
            tracks: vec![GpxTrack::with_segments(vec![Track::new(vec![
                TrackPoint::new(lat_for(200.0), 0.0),
                TrackPoint::new(lat_for(800.0), 0.0),
            ])])],
            ..Default::default()
        };
        let mut tcx = recorded(1000);
        let before = tcx.primary_track().unwrap().points.clone();

        let report = sync_route(
            &mut tcx,
            &gpx,
            Some(TimeWindow::new(at(0), at(1000))),
            InterpolateMode::MatchLatLon,
            &DeviceProfile::polar(),
        )
        .unwrap()
        .completed()
        .unwrap();

        assert_eq!(report.range, MatchRange { first: 20, last: 80 });
        let after = &tcx.primary_track().unwrap().points;
        assert_eq!(after[10].position, before[10].position);
        assert_eq!(after[90].position, before[90].position);
        assert_eq!(after[20].position, Some(Position::new(lat_for(200.0), 0.0)));
        // Recalculation ran.
        assert_eq!(tcx.activities[0].id, Some(T0));
        assert!(report.to_string().starts_with(
            "Matched from trackpoint 20 to 80 [2022-08-20 07:33:20Z to 2022-08-20 07:43:20Z]"
        ));
    }

    #[test]
    fn test_out_of_order_falls_back_to_first_positioned() {
        // Route runs backwards relative to the recording.
        let gpx = GpxDocument {
            tracks: vec![GpxTrack::with_segments(vec![Track::new(vec![
                TrackPoint::new(lat_for(900.0), 0.0),
                TrackPoint::new(lat_for(100.0), 0.0),
            ])])],
            ..Default::default()
        };
        let tcx = recorded(1000);
        let window = TimeWindow::new(at(300), at(1000));
        let track = tcx.primary_track().unwrap();
        let scan = EndpointScan::run(
            track,
            &window,
            Position::new(lat_for(900.0), 0.0),
            Position::new(lat_for(100.0), 0.0),
        );
        assert_eq!(scan.nearest_first, Some(90));
        assert_eq!(scan.nearest_last, Some(30));
        assert_eq!(
            nearest_endpoints(&scan),
            Err(Rejection::OutOfOrder(MatchRange { first: 90, last: 30 }))
        );
        assert_eq!(
            resolve_range(InterpolateMode::MatchLatLon, &scan).unwrap(),
            MatchRange { first: 30, last: 30 }
        );

        // A single-point range has no duration.
        let mut tcx = tcx;
        let result = sync_route(
            &mut tcx,
            &gpx,
            Some(window),
            InterpolateMode::MatchLatLon,
            &DeviceProfile::polar(),
        );
        assert!(matches!(result, Err(TrackError::ZeroDuration)));
    }

    #[test]
    fn test_failures_leave_document_untouched() {
        let mut tcx = recorded(100);
        let original = tcx.clone();

        let short = route_along_meridian(100.0, 2);
        let mut one_point = short.clone();
        one_point.tracks[0].segments[0].points.truncate(1);
        assert!(matches!(
            sync_route(
                &mut tcx,
                &one_point,
                Some(TimeWindow::new(at(0), at(100))),
                InterpolateMode::MatchLatLon,
                &DeviceProfile::polar()
            ),
            Err(TrackError::RouteTooShort(1))
        ));

        let empty_window = TimeWindow::new(at(5000), at(6000));
        assert!(matches!(
            sync_route(
                &mut tcx,
                &short,
                Some(empty_window),
                InterpolateMode::UseInterval,
                &DeviceProfile::polar()
            ),
            Err(TrackError::NoPointsInWindow)
        ));

        let aborted = sync_route(
            &mut tcx,
            &short,
            None,
            InterpolateMode::UseInterval,
            &DeviceProfile::polar(),
        )
        .unwrap();
        assert!(aborted.is_aborted());
        assert_eq!(tcx, original);
    }

    #[test]
    fn test_no_activities() {
        let mut tcx = TcxDocument::default();
        let result = sync_route(
            &mut tcx,
            &route_along_meridian(10.0, 2),
            Some(TimeWindow::new(at(0), at(1))),
            InterpolateMode::UseInterval,
            &DeviceProfile::polar(),
        );
        assert!(matches!(result, Err(TrackError::NoActivities)));
    }
}
