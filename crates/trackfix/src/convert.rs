//! Conversion between the GPX and TCX document models.

use tracing::info;

use crate::config::DeviceProfile;
use crate::models::{
    Activity, GpxDocument, GpxMetadata, GpxTrack, Lap, TcxDocument, Track, TrackPoint,
};
use crate::recalc::recalculate;

/// Activity notes assembled from GPX metadata, e.g.
/// `Trail 7. category=Hiking desc=Loop author=Jo`.
fn notes_from_metadata(metadata: &GpxMetadata) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(location) = metadata.location.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("{location}."));
    }
    if let Some(category) = metadata.category.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("category={category}"));
    }
    if let Some(desc) = metadata.description.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("desc={desc}"));
    }
    if let Some(author) = metadata.author.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("author={author}"));
    }
    (!parts.is_empty()).then(|| parts.join(" "))
}

/// Builds a single-activity TCX document in which each GPX track is a lap and
/// each segment a track. Lap figures come from [`recalculate`].
pub fn gpx_to_tcx(gpx: &GpxDocument, device: &DeviceProfile) -> TcxDocument {
    let laps = gpx
        .tracks
        .iter()
        .map(|trk| Lap::with_tracks(trk.segments.clone()))
        .collect();

    let activity = Activity {
        id: None,
        sport: gpx.metadata.category.clone().filter(|s| !s.is_empty()),
        notes: notes_from_metadata(&gpx.metadata),
        creator: Some(crate::CREATOR.to_string()),
        laps,
    };
    let mut tcx = TcxDocument {
        author: gpx.metadata.author.clone(),
        activities: vec![activity],
    };
    recalculate(&mut tcx, device);

    info!(
        laps = tcx.activities[0].laps.len(),
        points = tcx.points().count(),
        "Converted GPX to TCX"
    );
    tcx
}

fn track_description(activity: &Activity) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(sport) = activity.sport.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("Sport: {sport}"));
    }
    if let Some(notes) = activity.notes.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("Notes: {notes}"));
    }
    (!parts.is_empty()).then(|| parts.join(" "))
}

/// Builds a GPX document in which each TCX lap is a track and each TCX track
/// a segment. Trackpoints without a position are dropped.
pub fn tcx_to_gpx(tcx: &TcxDocument) -> GpxDocument {
    let mut dropped = 0usize;
    let mut tracks = Vec::new();
    for activity in &tcx.activities {
        let description = track_description(activity);
        for lap in &activity.laps {
            let segments = lap
                .tracks
                .iter()
                .map(|track| {
                    let points: Vec<TrackPoint> = track
                        .points
                        .iter()
                        .filter(|p| p.position.is_some())
                        .map(|p| TrackPoint {
                            distance_meters: None,
                            ..p.clone()
                        })
                        .collect();
                    dropped += track.points.len() - points.len();
                    Track::new(points)
                })
                .collect();
            tracks.push(GpxTrack {
                name: None,
                description: description.clone(),
                segments,
            });
        }
    }

    let gpx = GpxDocument {
        creator: Some(crate::CREATOR.to_string()),
        metadata: GpxMetadata {
            author: tcx.author.clone(),
            ..Default::default()
        },
        tracks,
        ..Default::default()
    };
    info!(tracks = gpx.tracks.len(), dropped, "Converted TCX to GPX");
    gpx
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::{Duration, OffsetDateTime};

    const T0: OffsetDateTime = datetime!(2019-08-03 09:30:00 UTC);

    fn segment(n: i64, lat0: f64) -> Track {
        Track::new(
            (0..n)
                .map(|i| {
                    TrackPoint::new(lat0 + 0.0005 * i as f64, -71.0)
                        .with_time(T0 + Duration::seconds(10 * i))
                        .with_heart_rate(130)
                        .with_cadence(80)
                })
                .collect(),
        )
    }

    #[test]
    fn test_gpx_to_tcx_structure() {
        let gpx = GpxDocument {
            metadata: GpxMetadata {
                category: Some("Hiking".into()),
                location: Some("Blue Hills".into()),
                author: Some("Jo".into()),
                ..Default::default()
            },
            tracks: vec![
                GpxTrack::with_segments(vec![segment(4, 42.0), segment(2, 42.01)]),
                GpxTrack::with_segments(vec![segment(3, 42.02)]),
            ],
            ..Default::default()
        };
        let tcx = gpx_to_tcx(&gpx, &DeviceProfile::polar());

        assert_eq!(tcx.author.as_deref(), Some("Jo"));
        assert_eq!(tcx.activities.len(), 1);
        let activity = &tcx.activities[0];
        assert_eq!(activity.sport.as_deref(), Some("Hiking"));
        assert_eq!(
            activity.notes.as_deref(),
            Some("Blue Hills. category=Hiking author=Jo")
        );
        assert_eq!(activity.laps.len(), 2);
        assert_eq!(activity.laps[0].tracks.len(), 2);
        assert_eq!(activity.id, Some(T0));
        assert!(activity.laps[0].distance_meters > 0.0);
        assert_eq!(activity.laps[0].average_heart_rate, Some(130));
        assert!(tcx.points().all(|p| p.cadence == Some(80)));
    }

    #[test]
    fn test_tcx_to_gpx_drops_unpositioned_points() {
        let mut track = segment(3, 10.0);
        track.points.insert(
            1,
            TrackPoint {
                time: Some(T0 + Duration::seconds(5)),
                heart_rate: Some(140),
                ..Default::default()
            },
        );
        let mut tcx = TcxDocument {
            author: Some("Polar".into()),
            activities: vec![Activity {
                sport: Some("Running".into()),
                laps: vec![
                    Lap::with_tracks(vec![track]),
                    Lap::with_tracks(vec![segment(2, 10.01)]),
                ],
                ..Default::default()
            }],
        };
        recalculate(&mut tcx, &DeviceProfile::polar());

        let gpx = tcx_to_gpx(&tcx);
        assert_eq!(gpx.tracks.len(), 2);
        assert_eq!(gpx.tracks[0].segments[0].points.len(), 3);
        assert_eq!(gpx.tracks[0].description.as_deref(), Some("Sport: Running"));
        assert_eq!(gpx.metadata.author.as_deref(), Some("Polar"));
        assert!(gpx.track_points().all(|p| p.distance_meters.is_none()));
        assert!(gpx.track_points().all(|p| p.heart_rate == Some(130)));
    }
}
