//! Activity summaries: totals, channel statistics, local times and the
//! human-readable info report.

use std::fmt;
use std::path::Path;

use serde::{Serialize, Serializer};
use time::macros::format_description;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::errors::{Result, TrackError};
use crate::metadata::{NameMetadata, Source, metadata_from_file_name};
use crate::models::{Document, GpxDocument, Position, TcxDocument};
use crate::series::{elevation_change, stats_with_fallback};
use crate::stream::{Bounds, StreamReduction, reduce_segments};
use crate::timezone::{Zone, ZoneLookup, resolve_zone};
use crate::units::{M2FT, M2MI, MPS2MPH, format_duration};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpeedSummary {
    /// Time-weighted average in m/s.
    pub avg: f64,
    /// Distance over duration in m/s.
    pub avg_simple: f64,
    /// Average over samples at or above the no-move threshold.
    pub avg_moving: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElevationSummary {
    pub start: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub gain: f64,
    pub loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeartRateSummary {
    pub min: u16,
    pub max: u16,
    pub avg: f64,
    pub samples: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
}

impl HeartRateSummary {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivitySummary {
    pub file_name: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub source: Source,
    pub category: Option<String>,
    pub location: Option<String>,
    pub n_tracks: usize,
    pub n_segments: usize,
    pub n_track_points: usize,
    pub time_zone: Zone,
    pub tz_from_lat_lon: bool,
    /// Local to `time_zone`.
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    #[serde(serialize_with = "as_seconds")]
    pub duration: Option<Duration>,
    /// Meters.
    pub distance: f64,
    pub start_position: Option<Position>,
    pub bounds: Option<Bounds>,
    pub speed: Option<SpeedSummary>,
    pub elevation: Option<ElevationSummary>,
    pub heart_rate: Option<HeartRateSummary>,
}

fn as_seconds<S: Serializer>(duration: &Option<Duration>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match duration {
        Some(d) => s.serialize_some(&d.as_seconds_f64()),
        None => s.serialize_none(),
    }
}

impl ActivitySummary {
    pub fn start_time_utc(&self) -> Option<OffsetDateTime> {
        self.start_time.map(|t| t.to_offset(time::UtcOffset::UTC))
    }

    pub fn end_time_utc(&self) -> Option<OffsetDateTime> {
        self.end_time.map(|t| t.to_offset(time::UtcOffset::UTC))
    }

    /// Local start time rounded to the nearest multiple of `interval_secs`.
    pub fn start_time_rounded(&self, interval_secs: i64) -> Option<OffsetDateTime> {
        let start = self.start_time?;
        if interval_secs <= 0 {
            return Some(start);
        }
        let interval = i128::from(interval_secs) * 1_000_000_000;
        let half = (interval + 1) >> 1;
        let local_nanos =
            start.unix_timestamp_nanos() + i128::from(start.offset().whole_seconds()) * 1_000_000_000;
        let rounded = (local_nanos + half).div_euclid(interval) * interval;
        let utc_nanos = rounded - i128::from(start.offset().whole_seconds()) * 1_000_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(utc_nanos)
            .ok()
            .map(|t| t.to_offset(start.offset()))
    }
}

/// Per-document context the summary cannot derive from the points.
struct Header {
    file_name: Option<String>,
    author: Option<String>,
    creator: Option<String>,
    names: NameMetadata,
    n_tracks: usize,
}

fn build(
    header: Header,
    reduction: StreamReduction,
    config: &EngineConfig,
    zones: &dyn ZoneLookup,
) -> ActivitySummary {
    let source = Source::from_creator(header.creator.as_deref());
    let names = match header.file_name.as_deref() {
        Some(name) => metadata_from_file_name(name, source, &header.names),
        None => header.names,
    };

    let (time_zone, tz_from_lat_lon) = match (reduction.start_position, reduction.start_time) {
        (Some(p), Some(start)) => {
            let (zone, from_lat_lon) = resolve_zone(zones, p.lat, p.lon);
            (zone.at(start), from_lat_lon)
        }
        _ => (Zone::system_default(), false),
    };

    let duration = match (reduction.start_time, reduction.end_time) {
        (Some(start), Some(end)) => Some(end - start),
        _ => None,
    };

    let speed = (!reduction.speed.is_empty()).then(|| {
        let mut speed = SpeedSummary::default();
        if let Some(stats) = stats_with_fallback(&reduction.speed, 0.0) {
            speed.min = stats.min;
            speed.max = stats.max;
            speed.avg = stats.avg;
        }
        if let Some(stats) = stats_with_fallback(&reduction.speed, config.no_move_speed_mps) {
            speed.avg_moving = stats.avg;
        }
        if let Some(d) = duration.filter(|d| d.is_positive()) {
            speed.avg_simple = reduction.distance / d.as_seconds_f64();
        }
        speed
    });

    let elevation = reduction.start_elevation.and_then(|start| {
        let stats = stats_with_fallback(&reduction.elevation, f64::NEG_INFINITY)?;
        let change = elevation_change(&reduction.elevation);
        Some(ElevationSummary {
            start,
            min: stats.min,
            max: stats.max,
            avg: stats.avg,
            gain: change.map_or(0.0, |c| c.gain),
            loss: change.map_or(0.0, |c| c.loss),
        })
    });

    let heart_rate = match (reduction.hr_start_time, reduction.hr_end_time) {
        (Some(start_time), Some(end_time)) => stats_with_fallback(&reduction.heart_rate, 0.0)
            .map(|stats| HeartRateSummary {
                min: stats.min.round() as u16,
                max: stats.max.round() as u16,
                avg: stats.avg,
                samples: reduction.hr_values(),
                start_time: time_zone.to_local(start_time),
                end_time: time_zone.to_local(end_time),
            }),
        _ => None,
    };

    debug!(
        points = reduction.points,
        speed_samples = reduction.speed.len(),
        hr_samples = reduction.hr_values(),
        "Reduced activity stream"
    );

    ActivitySummary {
        file_name: header.file_name,
        author: header.author,
        creator: header.creator,
        source,
        category: names.category,
        location: names.location,
        n_tracks: header.n_tracks,
        n_segments: reduction.segments,
        n_track_points: reduction.points,
        start_time: reduction.start_time.map(|t| time_zone.to_local(t)),
        end_time: reduction.end_time.map(|t| time_zone.to_local(t)),
        time_zone,
        tz_from_lat_lon,
        duration,
        distance: reduction.distance,
        start_position: reduction.start_position,
        bounds: reduction.bounds,
        speed,
        elevation,
        heart_rate,
    }
}

fn file_name_of(path: Option<&Path>) -> Option<String> {
    path.map(|p| p.display().to_string())
}

pub fn summarize_gpx(
    gpx: &GpxDocument,
    path: Option<&Path>,
    config: &EngineConfig,
    zones: &dyn ZoneLookup,
) -> ActivitySummary {
    let segments = gpx
        .tracks
        .iter()
        .flat_map(|t| t.segments.iter())
        .map(|s| s.points.as_slice());
    let header = Header {
        file_name: file_name_of(path),
        author: gpx.metadata.author.clone(),
        creator: gpx.creator.clone(),
        names: NameMetadata {
            category: gpx.metadata.category.clone(),
            location: gpx.metadata.location.clone(),
        },
        n_tracks: gpx.tracks.len(),
    };
    let summary = build(header, reduce_segments(segments), config, zones);
    info!(
        tracks = summary.n_tracks,
        points = summary.n_track_points,
        "Summarized GPX"
    );
    summary
}

pub fn summarize_tcx(
    tcx: &TcxDocument,
    path: Option<&Path>,
    config: &EngineConfig,
    zones: &dyn ZoneLookup,
) -> Result<ActivitySummary> {
    if tcx.activities.is_empty() {
        return Err(TrackError::NoActivities);
    }
    let segments = tcx
        .activities
        .iter()
        .flat_map(|a| a.laps.iter())
        .flat_map(|l| l.tracks.iter())
        .map(|t| t.points.as_slice());
    let header = Header {
        file_name: file_name_of(path),
        author: tcx.author.clone(),
        // The last activity naming a creator wins.
        creator: tcx.activities.iter().rev().find_map(|a| a.creator.clone()),
        names: NameMetadata::default(),
        n_tracks: tcx.activities.iter().map(|a| a.laps.len()).sum(),
    };
    let summary = build(header, reduce_segments(segments), config, zones);
    info!(
        laps = summary.n_tracks,
        points = summary.n_track_points,
        "Summarized TCX"
    );
    Ok(summary)
}

pub fn summarize(
    document: &Document,
    path: Option<&Path>,
    config: &EngineConfig,
    zones: &dyn ZoneLookup,
) -> Result<ActivitySummary> {
    match document {
        Document::Gpx(gpx) => Ok(summarize_gpx(gpx, path, config, zones)),
        Document::Tcx(tcx) => summarize_tcx(tcx, path, config, zones),
    }
}

fn fmt_time(
    f: &mut fmt::Formatter<'_>,
    time: Option<OffsetDateTime>,
    utc: bool,
) -> fmt::Result {
    let Some(time) = time else {
        return f.write_str("NA");
    };
    let text = if utc {
        time.format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        ))
    } else {
        time.format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
    };
    f.write_str(&text.map_err(|_| fmt::Error)?)
}

impl fmt::Display for ActivitySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();

        if let Some(name) = &self.file_name {
            writeln!(f, "{name}")?;
        }
        writeln!(f, "Author: {}", opt(&self.author))?;
        writeln!(f, "Creator: {}", opt(&self.creator))?;
        writeln!(f, "Source: {}", self.source)?;
        writeln!(f, "Category: {}", opt(&self.category))?;
        writeln!(f, "Location: {}", opt(&self.location))?;
        writeln!(
            f,
            "NTracks={} NSegments={} NTrackPoints={}",
            self.n_tracks, self.n_segments, self.n_track_points
        )?;
        writeln!(f, "TimeZone: {}", self.time_zone)?;
        writeln!(f, "TimeZoneInfoFromLatLon: {}", self.tz_from_lat_lon)?;

        f.write_str("Start Time: ")?;
        fmt_time(f, self.start_time, false)?;
        f.write_str(" End Time: ")?;
        fmt_time(f, self.end_time, false)?;
        f.write_str("\nStartTime[UTC]: ")?;
        fmt_time(f, self.start_time_utc(), true)?;
        f.write_str(" End Time[UTC]: ")?;
        fmt_time(f, self.end_time_utc(), true)?;
        writeln!(f)?;

        match self.duration {
            Some(d) => writeln!(f, "Duration: {}", format_duration(d))?,
            None => writeln!(f, "Duration: NA")?,
        }
        writeln!(f, "Distance: {:.2} mi", M2MI * self.distance)?;
        let speed = self.speed.unwrap_or_default();
        writeln!(f, "Average Speed: {:.2} mi/hr", MPS2MPH * speed.avg)?;
        writeln!(f, "Moving Speed: {:.2} mi/hr", MPS2MPH * speed.avg_moving)?;

        match &self.heart_rate {
            Some(hr) if hr.avg > 0.0 => writeln!(
                f,
                "Heart Rate: Avg={:.1} Min={} Max={}",
                hr.avg, hr.min, hr.max
            )?,
            _ => writeln!(f, "Heart Rate: No heart rate data")?,
        }

        match &self.elevation {
            Some(e) => writeln!(
                f,
                "Elevation: Start={:.0} Min={:.0} Max={:.0} Gain={:.0} Loss={:.0} ft",
                M2FT * e.start,
                M2FT * e.min,
                M2FT * e.max,
                M2FT * e.gain,
                M2FT * e.loss
            )?,
            None => writeln!(f, "Elevation: No elevation data")?,
        }

        match &self.bounds {
            Some(b) => write!(
                f,
                "Bounds: LatMin={:.6} LatMax={:.6} LonMin={:.6} LonMax={:.6}",
                b.lat_min, b.lat_max, b.lon_min, b.lon_max
            ),
            None => write!(f, "Bounds: No location data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Activity, GpxTrack, Lap, Track, TrackPoint};
    use crate::timezone::NauticalZones;
    use std::path::PathBuf;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-09-14 15:02:40 UTC);

    fn walk(n: usize) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| {
                TrackPoint::new(42.0 + i as f64 * 0.0001, -83.0)
                    .with_time(T0 + Duration::seconds(10 * i as i64))
                    .with_elevation(200.0 + (i % 3) as f64)
                    .with_heart_rate(100 + i as u16)
            })
            .collect()
    }

    #[test]
    fn test_summarize_gpx_basic() {
        let gpx = GpxDocument {
            creator: Some("Polar Beat".to_string()),
            tracks: vec![GpxTrack::with_segments(vec![Track::new(walk(11))])],
            ..Default::default()
        };
        let path = PathBuf::from("Jane_Doe_2024-09-14_11-02-40_Walking_Island_Lake.gpx");
        let summary = summarize_gpx(&gpx, Some(&path), &EngineConfig::default(), &NauticalZones);

        assert_eq!(summary.source, Source::Polar);
        assert_eq!(summary.category.as_deref(), Some("Walking"));
        assert_eq!(summary.location.as_deref(), Some("Island Lake"));
        assert_eq!(summary.n_tracks, 1);
        assert_eq!(summary.n_segments, 1);
        assert_eq!(summary.n_track_points, 11);
        assert!(summary.tz_from_lat_lon);
        assert_eq!(summary.time_zone.id, "Etc/GMT+6");
        assert_eq!(summary.start_time.map(|t| t.hour()), Some(9));
        assert_eq!(summary.start_time_utc(), Some(T0));
        assert_eq!(summary.duration, Some(Duration::seconds(100)));

        let speed = summary.speed.unwrap();
        // Constant pace along a meridian.
        assert!((speed.avg - speed.avg_simple).abs() < 1e-6);
        assert!((speed.avg_moving - speed.avg).abs() < 1e-6);

        let hr = summary.heart_rate.unwrap();
        assert_eq!((hr.min, hr.max), (100, 110));
        assert_eq!(hr.samples, 11);

        let elevation = summary.elevation.unwrap();
        assert_eq!(elevation.start, 200.0);
        assert_eq!((elevation.min, elevation.max), (200.0, 202.0));
    }

    #[test]
    fn test_summarize_tcx_counts_laps_and_tracks() {
        let points = walk(6);
        let tcx = TcxDocument {
            author: Some("Polar Flow".to_string()),
            activities: vec![Activity {
                creator: Some("Polar Beat".to_string()),
                laps: vec![
                    Lap::with_tracks(vec![
                        Track::new(points[..3].to_vec()),
                        Track::new(points[3..].to_vec()),
                    ]),
                    Lap::with_tracks(vec![Track::new(walk(2))]),
                ],
                ..Default::default()
            }],
        };
        let summary = summarize_tcx(&tcx, None, &EngineConfig::default(), &NauticalZones).unwrap();
        assert_eq!(summary.n_tracks, 2);
        assert_eq!(summary.n_segments, 3);
        assert_eq!(summary.n_track_points, 8);
        assert_eq!(summary.author.as_deref(), Some("Polar Flow"));
    }

    #[test]
    fn test_summarize_tcx_without_activities() {
        let result = summarize_tcx(
            &TcxDocument::default(),
            None,
            &EngineConfig::default(),
            &NauticalZones,
        );
        assert!(matches!(result, Err(TrackError::NoActivities)));
    }

    #[test]
    fn test_untimed_route_has_no_speed() {
        let gpx = GpxDocument {
            tracks: vec![GpxTrack::with_segments(vec![Track::new(vec![
                TrackPoint::new(1.0, 1.0),
                TrackPoint::new(1.0, 1.01),
            ])])],
            ..Default::default()
        };
        let summary = summarize_gpx(&gpx, None, &EngineConfig::default(), &NauticalZones);
        assert!(summary.speed.is_none());
        assert!(summary.duration.is_none());
        assert!(!summary.tz_from_lat_lon);
        assert!(summary.distance > 1000.0);

        let report = summary.to_string();
        assert!(report.contains("Heart Rate: No heart rate data"));
        assert!(report.contains("Elevation: No elevation data"));
        assert!(report.contains("Start Time: NA"));
    }

    #[test]
    fn test_report_lines() {
        let gpx = GpxDocument {
            tracks: vec![GpxTrack::with_segments(vec![Track::new(walk(4))])],
            ..Default::default()
        };
        let summary = summarize_gpx(&gpx, None, &EngineConfig::default(), &NauticalZones);
        let report = summary.to_string();
        assert!(report.contains("NTracks=1 NSegments=1 NTrackPoints=4"));
        assert!(report.contains("StartTime[UTC]: 2024-09-14T15:02:40.000Z"));
        assert!(report.contains("Start Time: 2024-09-14 09:02:40"));
        assert!(report.contains("Duration: 30s"));
        assert!(report.starts_with("Author: "));
        assert!(!report.ends_with('\n'));
    }

    /// Resolves every coordinate to America/Detroit, pinned in winter.
    struct Detroit;

    impl ZoneLookup for Detroit {
        fn zone_for(&self, _lat: f64, _lon: f64) -> crate::errors::Result<Zone> {
            Zone::named("America/Detroit", datetime!(2024-01-01 00:00:00 UTC))
        }
    }

    #[test]
    fn test_zone_pinned_to_activity_start() {
        let gpx = GpxDocument {
            tracks: vec![GpxTrack::with_segments(vec![Track::new(walk(3))])],
            ..Default::default()
        };
        let summary = summarize_gpx(&gpx, None, &EngineConfig::default(), &Detroit);

        assert_eq!(summary.time_zone.offset.whole_hours(), -4);
        assert_eq!(summary.start_time.unwrap().hour(), 11);
        assert!(summary.to_string().contains("TimeZone: America/Detroit (UTC-04:00)"));
    }

    #[test]
    fn test_start_time_rounded() {
        let gpx = GpxDocument {
            tracks: vec![GpxTrack::with_segments(vec![Track::new(walk(2))])],
            ..Default::default()
        };
        let summary = summarize_gpx(&gpx, None, &EngineConfig::default(), &NauticalZones);
        let rounded = summary.start_time_rounded(300).unwrap();
        assert_eq!(rounded, datetime!(2024-09-14 15:05:00 UTC));
        assert_eq!(rounded.offset(), summary.time_zone.offset);

        let rounded = summary.start_time_rounded(3600).unwrap();
        assert_eq!(rounded, datetime!(2024-09-14 15:00:00 UTC));
    }
}
