//! In-memory document model shared by every operation.
//!
//! Both track-file formats decode into these types. TCX documents form the
//! Activity → Lap → Track → TrackPoint hierarchy; GPX documents hold tracks of
//! segments plus routes and standalone waypoints. Segments reuse [`Track`].

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<geo::Point<f64>> for Position {
    fn from(point: geo::Point<f64>) -> Self {
        Self {
            lat: point.y(),
            lon: point.x(),
        }
    }
}

/// One recorded GPS sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub position: Option<Position>,
    /// Meters above sea level.
    pub elevation: Option<f64>,
    pub time: Option<OffsetDateTime>,
    /// Beats per minute. A stored zero reads as absent.
    pub heart_rate: Option<u16>,
    pub cadence: Option<u16>,
    /// Running distance from the start of the activity, in meters.
    pub distance_meters: Option<f64>,
}

impl TrackPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            position: Some(Position::new(lat, lon)),
            ..Default::default()
        }
    }

    pub fn with_time(mut self, time: OffsetDateTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_heart_rate(mut self, bpm: u16) -> Self {
        self.heart_rate = Some(bpm);
        self
    }

    pub fn with_cadence(mut self, cadence: u16) -> Self {
        self.cadence = Some(cadence);
        self
    }

    /// Heart rate with the zero-means-absent convention applied.
    pub fn heart_rate_bpm(&self) -> Option<u16> {
        self.heart_rate.filter(|hr| *hr > 0)
    }
}

/// A contiguous run of track points (a TCX `Track` or a GPX `trkseg`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub points: Vec<TrackPoint>,
}

impl Track {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lap {
    pub start_time: Option<OffsetDateTime>,
    pub total_time_seconds: f64,
    pub distance_meters: f64,
    /// Meters per second.
    pub maximum_speed: Option<f64>,
    /// Meters per second.
    pub average_speed: Option<f64>,
    pub calories: Option<u16>,
    pub average_heart_rate: Option<u8>,
    pub maximum_heart_rate: Option<u8>,
    pub tracks: Vec<Track>,
}

impl Lap {
    pub fn with_tracks(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            ..Default::default()
        }
    }

    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.tracks.iter().flat_map(|t| t.points.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// TCX identifies an activity by its start time.
    pub id: Option<OffsetDateTime>,
    pub sport: Option<String>,
    pub notes: Option<String>,
    pub creator: Option<String>,
    pub laps: Vec<Lap>,
}

impl Activity {
    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.laps.iter().flat_map(|l| l.points())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TcxDocument {
    pub author: Option<String>,
    pub activities: Vec<Activity>,
}

impl TcxDocument {
    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.activities.iter().flat_map(|a| a.points())
    }

    /// The first track of the first lap of the first activity.
    ///
    /// Editing operations only touch this track; single-activity devices
    /// never write more than one.
    pub fn primary_track_mut(&mut self) -> Option<&mut Track> {
        self.activities
            .first_mut()
            .and_then(|a| a.laps.first_mut())
            .and_then(|l| l.tracks.first_mut())
    }

    pub fn primary_track(&self) -> Option<&Track> {
        self.activities
            .first()
            .and_then(|a| a.laps.first())
            .and_then(|l| l.tracks.first())
    }
}

/// A standalone GPX waypoint, also used for route points and POIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: Option<String>,
    pub description: Option<String>,
    pub position: Position,
    pub elevation: Option<f64>,
    pub time: Option<OffsetDateTime>,
}

impl Waypoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            name: None,
            description: None,
            position: Position::new(lat, lon),
            elevation: None,
            time: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub name: Option<String>,
    pub points: Vec<Waypoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpxTrack {
    pub name: Option<String>,
    pub description: Option<String>,
    pub segments: Vec<Track>,
}

impl GpxTrack {
    pub fn with_segments(segments: Vec<Track>) -> Self {
        Self {
            segments,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpxMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    /// SportsTrackLive extension.
    pub category: Option<String>,
    /// SportsTrackLive extension.
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpxDocument {
    pub creator: Option<String>,
    pub metadata: GpxMetadata,
    pub tracks: Vec<GpxTrack>,
    pub routes: Vec<Route>,
    pub waypoints: Vec<Waypoint>,
    /// Trackpoint times were written without a UTC offset and read as UTC.
    #[serde(default)]
    pub unzoned_times: bool,
}

impl GpxDocument {
    pub fn track_points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .flat_map(|s| s.points.iter())
    }

    pub fn track_points_mut(&mut self) -> impl Iterator<Item = &mut TrackPoint> {
        self.tracks
            .iter_mut()
            .flat_map(|t| t.segments.iter_mut())
            .flat_map(|s| s.points.iter_mut())
    }
}

/// A decoded track file of either format.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Gpx(GpxDocument),
    Tcx(TcxDocument),
}

/// Closed UTC interval bounding which samples take part in an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl TimeWindow {
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: OffsetDateTime) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Result of an operation that depends on input from a prompting collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    /// The collaborator supplied no input; nothing was touched.
    Aborted,
}

impl<T> Outcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Aborted => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Outcome::Aborted)
    }
}
