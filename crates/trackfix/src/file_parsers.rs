//! Activity file parsers for GPX and TCX formats.
//!
//! Both parsers produce the crate's own document models. TCX trackpoints
//! without a position are kept, since their time and heart rate still feed
//! the statistics.
//!
//! The gpx crate skips `<extensions>` content and normalizes every time to
//! UTC, so GPX input gets a second quick-xml pass for heart rate, cadence,
//! the metadata category and location, and times written without an offset.

use std::fmt;
use std::io::BufReader;
use std::path::Path;

use bytes::Buf as _;
use bytes::Bytes;
use quick_xml::Reader;
use quick_xml::events::Event;
use time::OffsetDateTime;
use tracing::debug;

use crate::errors::ParseError;
use crate::models::{
    Activity, Document, GpxDocument, GpxMetadata, GpxTrack, Lap, Position, Route, TcxDocument,
    Track, TrackPoint, Waypoint,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Gpx,
    Tcx,
    Other,
}

impl FileType {
    /// File type from the extension, case-insensitive.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("gpx") => FileType::Gpx,
            Some("tcx") => FileType::Tcx,
            _ => FileType::Other,
        }
    }

    /// Sniffs the root element from the first kilobyte.
    pub fn detect_from_bytes(bytes: &[u8]) -> Self {
        let head = &bytes[..bytes.len().min(1024)];
        let head = String::from_utf8_lossy(head);
        if head.contains("<TrainingCenterDatabase") {
            FileType::Tcx
        } else if head.contains("<gpx") {
            FileType::Gpx
        } else {
            FileType::Other
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileType::Gpx => "GPX",
            FileType::Tcx => "TCX",
            FileType::Other => "unknown",
        })
    }
}

/// Parse an activity file based on its type.
/// For FileType::Other, attempts to detect the format from the bytes.
pub fn parse_document(file_type: FileType, bytes: Bytes) -> Result<Document, ParseError> {
    let actual_type = if file_type == FileType::Other {
        FileType::detect_from_bytes(&bytes)
    } else {
        file_type
    };

    match actual_type {
        FileType::Gpx => parse_gpx(bytes).map(Document::Gpx),
        FileType::Tcx => parse_tcx(bytes).map(Document::Tcx),
        FileType::Other => Err(ParseError::UnsupportedFileType(actual_type)),
    }
}

fn gpx_time(time: &gpx::Time) -> Option<OffsetDateTime> {
    time.format().ok().and_then(|s| {
        OffsetDateTime::parse(&s, &time::format_description::well_known::Rfc3339).ok()
    })
}

/// Per-trackpoint values the gpx crate drops, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
struct PointExtras {
    heart_rate: Option<u16>,
    cadence: Option<u16>,
    unzoned_time: bool,
}

#[derive(Debug, Default)]
struct GpxExtras {
    points: Vec<PointExtras>,
    category: Option<String>,
    location: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum TextTarget {
    HeartRate,
    Cadence,
    Time,
    Category,
    Location,
}

/// True when an XML dateTime carries `Z` or a numeric offset.
fn has_zone_designator(time: &str) -> bool {
    let time = time.trim();
    if time.ends_with(['Z', 'z']) {
        return true;
    }
    time.split_once('T')
        .is_some_and(|(_, clock)| clock.contains(['+', '-']))
}

/// Walks the raw XML for the extension elements, matching on local names so
/// any namespace prefix works.
fn scan_gpx_extras(bytes: &[u8]) -> Result<GpxExtras, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut extras = GpxExtras::default();
    let mut in_metadata = false;
    let mut in_trkpt = false;
    let mut target = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(ParseError::GpxError(e.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = true,
                b"trkpt" => {
                    in_trkpt = true;
                    extras.points.push(PointExtras::default());
                }
                b"hr" if in_trkpt => target = Some(TextTarget::HeartRate),
                b"cad" if in_trkpt => target = Some(TextTarget::Cadence),
                b"time" if in_trkpt => target = Some(TextTarget::Time),
                b"category" if in_metadata => target = Some(TextTarget::Category),
                b"location" if in_metadata => target = Some(TextTarget::Location),
                _ => target = None,
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    extras.points.push(PointExtras::default());
                }
            }
            Ok(Event::Text(t)) if target.is_some() => {
                let text = t
                    .unescape()
                    .map_err(|e| ParseError::GpxError(e.to_string()))?;
                let text = text.trim();
                match (target, extras.points.last_mut()) {
                    (Some(TextTarget::HeartRate), Some(point)) => {
                        point.heart_rate = text.parse().ok()
                    }
                    (Some(TextTarget::Cadence), Some(point)) => point.cadence = text.parse().ok(),
                    (Some(TextTarget::Time), Some(point)) => {
                        point.unzoned_time = !has_zone_designator(text)
                    }
                    (Some(TextTarget::Category), _) => extras.category = Some(text.to_string()),
                    (Some(TextTarget::Location), _) => extras.location = Some(text.to_string()),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"metadata" => in_metadata = false,
                    b"trkpt" => in_trkpt = false,
                    _ => {}
                }
                target = None;
            }
            Ok(_) => {}
        }
        buf.clear();
    }
    Ok(extras)
}

fn gpx_track_point(pt: &gpx::Waypoint, extras: Option<&PointExtras>) -> TrackPoint {
    TrackPoint {
        position: Some(Position::from(pt.point())),
        elevation: pt.elevation,
        time: pt.time.as_ref().and_then(gpx_time),
        heart_rate: extras.and_then(|x| x.heart_rate).filter(|hr| *hr > 0),
        cadence: extras.and_then(|x| x.cadence),
        distance_meters: None,
    }
}

fn gpx_waypoint(pt: &gpx::Waypoint) -> Waypoint {
    Waypoint {
        name: pt.name.clone(),
        description: pt.description.clone(),
        position: Position::from(pt.point()),
        elevation: pt.elevation,
        time: pt.time.as_ref().and_then(gpx_time),
    }
}

/// Parse a GPX file into tracks, routes and waypoints.
pub fn parse_gpx(bytes: Bytes) -> Result<GpxDocument, ParseError> {
    let extras = scan_gpx_extras(&bytes)?;
    let gpx = gpx::read(bytes.reader()).map_err(|e| ParseError::GpxError(e.to_string()))?;
    let parsed: usize = gpx
        .tracks
        .iter()
        .flat_map(|t| &t.segments)
        .map(|s| s.points.len())
        .sum();
    if parsed != extras.points.len() {
        debug!(
            parsed,
            scanned = extras.points.len(),
            "Scanned trackpoint count differs from parsed"
        );
    }
    let mut point_extras = extras.points.iter();

    let metadata = gpx
        .metadata
        .as_ref()
        .map(|m| GpxMetadata {
            name: m.name.clone(),
            description: m.description.clone(),
            author: m.author.as_ref().and_then(|p| p.name.clone()),
            ..Default::default()
        })
        .unwrap_or_default();

    let tracks: Vec<GpxTrack> = gpx
        .tracks
        .iter()
        .map(|trk| GpxTrack {
            name: trk.name.clone(),
            description: trk.description.clone(),
            segments: trk
                .segments
                .iter()
                .map(|seg| {
                    Track::new(
                        seg.points
                            .iter()
                            .map(|pt| gpx_track_point(pt, point_extras.next()))
                            .collect(),
                    )
                })
                .collect(),
        })
        .collect();

    let routes = gpx
        .routes
        .iter()
        .map(|rte| Route {
            name: rte.name.clone(),
            points: rte.points.iter().map(gpx_waypoint).collect(),
        })
        .collect();

    let doc = GpxDocument {
        creator: gpx.creator.clone(),
        metadata: GpxMetadata {
            // Failing the extension, the track type is the closest thing GPX
            // has to a sport.
            category: extras
                .category
                .or_else(|| gpx.tracks.iter().find_map(|t| t.type_.clone())),
            location: extras.location,
            ..metadata
        },
        tracks,
        routes,
        waypoints: gpx.waypoints.iter().map(gpx_waypoint).collect(),
        unzoned_times: extras.points.iter().any(|p| p.unzoned_time),
    };
    debug!(
        tracks = doc.tracks.len(),
        routes = doc.routes.len(),
        waypoints = doc.waypoints.len(),
        unzoned_times = doc.unzoned_times,
        "Parsed GPX"
    );
    Ok(doc)
}

/// Parse a TCX (Training Center XML) file.
pub fn parse_tcx(bytes: Bytes) -> Result<TcxDocument, ParseError> {
    // TCX crate needs a BufReader
    let mut buf_reader = BufReader::new(bytes.reader());

    let tcx_data =
        tcx::read(&mut buf_reader).map_err(|e| ParseError::TcxError(format!("{e:?}")))?;

    let mut activities = Vec::new();
    if let Some(ref list) = tcx_data.activities {
        for activity in &list.activities {
            let laps = activity
                .laps
                .iter()
                .map(|lap| {
                    Lap::with_tracks(
                        lap.tracks
                            .iter()
                            .map(|track| {
                                Track::new(
                                    track
                                        .trackpoints
                                        .iter()
                                        .map(|tp| TrackPoint {
                                            position: tp
                                                .position
                                                .as_ref()
                                                .map(|p| Position::new(p.latitude, p.longitude)),
                                            elevation: tp.altitude_meters,
                                            time: Some(chrono_to_offset_datetime_utc(&tp.time)),
                                            heart_rate: tp
                                                .heart_rate
                                                .as_ref()
                                                .map(|h| h.value as u16)
                                                .filter(|&hr| hr > 0),
                                            cadence: tp.cadence.map(|c| c as u16),
                                            distance_meters: None,
                                        })
                                        .collect(),
                                )
                            })
                            .collect(),
                    )
                })
                .collect();
            activities.push(Activity {
                laps,
                ..Default::default()
            });
        }
    }

    let doc = TcxDocument {
        author: None,
        activities,
    };
    debug!(
        activities = doc.activities.len(),
        points = doc.points().count(),
        "Parsed TCX"
    );
    Ok(doc)
}

/// Convert chrono DateTime<Utc> to time OffsetDateTime
fn chrono_to_offset_datetime_utc(dt: &chrono::DateTime<chrono::Utc>) -> OffsetDateTime {
    let ts = dt.timestamp();
    let ns = dt.timestamp_subsec_nanos();

    OffsetDateTime::from_unix_timestamp(ts)
        .map(|odt| odt.replace_nanosecond(ns).unwrap_or(odt))
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
