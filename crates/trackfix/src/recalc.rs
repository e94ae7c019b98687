//! Recomputes the derived lap and activity fields of a TCX document after
//! its trackpoints were edited.
//!
//! Figures are computed for the whole document first and written back in a
//! single pass afterwards. Only points feed the computation, so running it
//! again on unchanged points writes identical values.

use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use crate::config::DeviceProfile;
use crate::models::{Activity, Lap, TcxDocument};
use crate::series::stats_with_fallback;
use crate::stream::reduce_segments;

/// Derived values for one lap.
#[derive(Debug, Clone, PartialEq)]
pub struct LapFigures {
    pub start_time: Option<OffsetDateTime>,
    pub total_time_seconds: f64,
    pub distance_meters: f64,
    pub maximum_speed: Option<f64>,
    pub average_speed: Option<f64>,
    pub average_heart_rate: Option<u8>,
    pub maximum_heart_rate: Option<u8>,
    /// Running distance for each point of each track, `None` for points
    /// without a position.
    pub point_distances: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityFigures {
    pub id: Option<OffsetDateTime>,
    pub laps: Vec<LapFigures>,
}

/// Heart rate as the file format stores it: 1..=255.
fn heart_rate_field(value: f64) -> u8 {
    value.round().clamp(1.0, 255.0) as u8
}

fn lap_figures(lap: &Lap, device: &DeviceProfile, running: &mut f64) -> LapFigures {
    let reduction = reduce_segments(lap.tracks.iter().map(|t| t.points.as_slice()));
    let offset = Duration::seconds(device.lap_start_offset_secs);

    let point_distances = lap
        .tracks
        .iter()
        .map(|track| {
            let mut prev = None;
            track
                .points
                .iter()
                .map(|point| {
                    let position = point.position?;
                    if let Some(prev) = prev.replace(position) {
                        *running += prev.distance_to(&position);
                    }
                    Some(device.distance_factor * *running)
                })
                .collect()
        })
        .collect();

    let (start_time, total_time_seconds) = match (reduction.start_time, reduction.end_time) {
        (Some(start), Some(end)) => (
            Some(start - offset),
            (end - start + offset).as_seconds_f64(),
        ),
        _ => (None, 0.0),
    };

    let speed = stats_with_fallback(&reduction.speed, 0.0).filter(|_| !reduction.speed.is_empty());
    let has_hr = reduction.hr_values() > 0;
    let hr = stats_with_fallback(&reduction.heart_rate, 0.0).filter(|_| has_hr);
    let hr_field = |value: Option<f64>, existing: Option<u8>| match value {
        Some(v) => Some(heart_rate_field(v)),
        None => existing.map(|_| 1),
    };

    LapFigures {
        start_time,
        total_time_seconds,
        distance_meters: device.distance_factor * reduction.distance,
        maximum_speed: speed.map(|s| s.max / device.distance_factor),
        average_speed: speed.map(|s| s.avg / device.distance_factor),
        average_heart_rate: hr_field(hr.map(|s| s.avg), lap.average_heart_rate),
        maximum_heart_rate: hr_field(hr.map(|s| s.max), lap.maximum_heart_rate),
        point_distances,
    }
}

pub fn activity_figures(activity: &Activity, device: &DeviceProfile) -> ActivityFigures {
    let mut running = 0.0;
    let laps = activity
        .laps
        .iter()
        .map(|lap| lap_figures(lap, device, &mut running))
        .collect();
    ActivityFigures {
        id: activity.points().find_map(|p| p.time),
        laps,
    }
}

fn apply(activity: &mut Activity, figures: ActivityFigures) {
    activity.id = figures.id;
    for (lap, fig) in activity.laps.iter_mut().zip(figures.laps) {
        lap.start_time = fig.start_time;
        lap.total_time_seconds = fig.total_time_seconds;
        lap.distance_meters = fig.distance_meters;
        // Calories are not computed; clear any stale value.
        lap.calories = Some(0);
        if fig.maximum_speed.is_some() {
            lap.maximum_speed = fig.maximum_speed;
        }
        if fig.average_speed.is_some() {
            lap.average_speed = fig.average_speed;
        }
        lap.average_heart_rate = fig.average_heart_rate;
        lap.maximum_heart_rate = fig.maximum_heart_rate;

        for (track, distances) in lap.tracks.iter_mut().zip(fig.point_distances) {
            for (point, distance) in track.points.iter_mut().zip(distances) {
                if distance.is_some() {
                    point.distance_meters = distance;
                }
            }
        }
    }
}

/// Recomputes lap start, duration, distance, speed and heart-rate fields,
/// per-point running distance, and the activity id of every activity.
pub fn recalculate(tcx: &mut TcxDocument, device: &DeviceProfile) {
    let figures: Vec<ActivityFigures> = tcx
        .activities
        .iter()
        .map(|a| activity_figures(a, device))
        .collect();

    for (activity, figures) in tcx.activities.iter_mut().zip(figures) {
        debug!(laps = figures.laps.len(), id = ?figures.id, "Applying recalculated figures");
        apply(activity, figures);
    }
    info!(
        activities = tcx.activities.len(),
        device = %device.name,
        "Recalculated TCX summary fields"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::great_circle_distance;
    use crate::models::{Track, TrackPoint};
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2023-11-05 12:00:00 UTC);

    fn points(n: usize, lat0: f64, t0: i64) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| {
                TrackPoint::new(lat0 + 0.001 * i as f64, 7.0)
                    .with_time(T0 + Duration::seconds(t0 + 5 * i as i64))
                    .with_heart_rate(120 + 2 * i as u16)
            })
            .collect()
    }

    fn doc() -> TcxDocument {
        TcxDocument {
            author: None,
            activities: vec![Activity {
                laps: vec![
                    Lap {
                        calories: Some(312),
                        average_heart_rate: Some(99),
                        ..Lap::with_tracks(vec![Track::new(points(5, 50.0, 0))])
                    },
                    Lap::with_tracks(vec![Track::new(points(3, 50.004, 20))]),
                ],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_recalculate_polar_conventions() {
        let mut tcx = doc();
        let device = DeviceProfile::polar();
        recalculate(&mut tcx, &device);

        let activity = &tcx.activities[0];
        assert_eq!(activity.id, Some(T0));

        let lap = &activity.laps[0];
        let step = great_circle_distance(50.0, 7.0, 50.001, 7.0);
        assert!((lap.distance_meters - 1.002 * 4.0 * step).abs() < 1e-6);
        assert_eq!(lap.start_time, Some(T0 - Duration::seconds(1)));
        assert_eq!(lap.total_time_seconds, 21.0);
        assert_eq!(lap.calories, Some(0));
        assert_eq!(lap.average_heart_rate, Some(124));
        assert_eq!(lap.maximum_heart_rate, Some(128));
        let max_speed = lap.maximum_speed.unwrap();
        assert!((max_speed - step / 5.0 / 1.002).abs() < 1e-6);

        let second = &activity.laps[1];
        assert_eq!(second.start_time, Some(T0 + Duration::seconds(19)));
        assert_eq!(second.total_time_seconds, 11.0);

        // Running distance carries across laps.
        let last = second.tracks[0].points.last().unwrap();
        let first_of_second = second.tracks[0].points[0].distance_meters.unwrap();
        let last_of_first = lap.tracks[0].points[4].distance_meters.unwrap();
        assert_eq!(first_of_second, last_of_first);
        assert!(last.distance_meters.unwrap() > first_of_second);
        assert_eq!(lap.tracks[0].points[0].distance_meters, Some(0.0));
    }

    #[test]
    fn test_recalculate_is_idempotent() {
        let mut once = doc();
        recalculate(&mut once, &DeviceProfile::polar());
        let mut twice = once.clone();
        recalculate(&mut twice, &DeviceProfile::polar());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_heart_rate_fields_clamped() {
        let mut tcx = TcxDocument {
            author: None,
            activities: vec![Activity {
                laps: vec![Lap {
                    average_heart_rate: Some(140),
                    maximum_heart_rate: Some(170),
                    ..Lap::with_tracks(vec![Track::new(vec![
                        TrackPoint::new(1.0, 1.0).with_time(T0),
                        TrackPoint::new(1.0, 1.001).with_time(T0 + Duration::seconds(5)),
                    ])])
                }],
                ..Default::default()
            }],
        };
        recalculate(&mut tcx, &DeviceProfile::neutral());
        let lap = &tcx.activities[0].laps[0];
        // No heart rate left in the points.
        assert_eq!(lap.average_heart_rate, Some(1));
        assert_eq!(lap.maximum_heart_rate, Some(1));
        assert_eq!(lap.total_time_seconds, 5.0);
        assert_eq!(lap.start_time, Some(T0));
        assert_eq!(heart_rate_field(300.0), 255);
        assert_eq!(heart_rate_field(0.2), 1);
    }

    #[test]
    fn test_lap_without_times() {
        let mut tcx = TcxDocument {
            author: None,
            activities: vec![Activity {
                laps: vec![Lap::with_tracks(vec![Track::new(vec![
                    TrackPoint::new(1.0, 1.0),
                    TrackPoint::new(1.0, 1.001),
                ])])],
                ..Default::default()
            }],
        };
        recalculate(&mut tcx, &DeviceProfile::polar());
        let activity = &tcx.activities[0];
        assert_eq!(activity.id, None);
        assert_eq!(activity.laps[0].start_time, None);
        assert_eq!(activity.laps[0].total_time_seconds, 0.0);
        assert!(activity.laps[0].distance_meters > 0.0);
        assert_eq!(activity.laps[0].maximum_speed, None);
    }
}
