//! Temporal interpolation of heart-rate and cadence samples, and the
//! transfer of those channels from a TCX recording onto a GPX track.

use std::fmt;

use time::OffsetDateTime;
use tracing::{debug, info};

use crate::errors::{Result, TrackError};
use crate::models::{GpxDocument, TcxDocument};

/// Heart rate and cadence at one instant. Absent readings are 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub heart_rate: i32,
    pub cadence: i32,
    pub time: OffsetDateTime,
}

impl SensorSample {
    pub fn new(heart_rate: i32, cadence: i32, time: OffsetDateTime) -> Self {
        Self {
            heart_rate,
            cadence,
            time,
        }
    }
}

/// Interpolates both channels of a time-ordered sample list at `time`.
///
/// Queries past either end extrapolate along the nearest pair rather than
/// clamping. Results are rounded and floored at 0. Returns `None` for an
/// empty list or when the bracketing samples share a timestamp. Among
/// samples sharing the query time, the last one brackets the query.
pub fn interpolate(samples: &[SensorSample], time: OffsetDateTime) -> Option<SensorSample> {
    match samples {
        [] => return None,
        [only] => return Some(*only),
        _ => {}
    }

    let last_at_or_before = samples.iter().rposition(|s| s.time <= time).unwrap_or(0);
    let i0 = last_at_or_before.min(samples.len() - 2);
    let (s0, s1) = (samples[i0], samples[i0 + 1]);

    let span = (s1.time - s0.time).as_seconds_f64();
    if span == 0.0 {
        return None;
    }
    let elapsed = (time - s0.time).as_seconds_f64();
    let channel = |v0: i32, v1: i32| {
        let value = v0 as f64 + elapsed * (v1 - v0) as f64 / span;
        (value.round() as i32).max(0)
    };

    Some(SensorSample {
        heart_rate: channel(s0.heart_rate, s1.heart_rate),
        cadence: channel(s0.cadence, s1.cadence),
        time,
    })
}

/// Counts of values written onto the GPX points, per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub hr_added: usize,
    pub hr_replaced: usize,
    pub cadence_added: usize,
    pub cadence_replaced: usize,
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Added {} and replaced {} HR values",
            self.hr_added, self.hr_replaced
        )?;
        write!(
            f,
            "  Added {} and replaced {} Cadence values",
            self.cadence_added, self.cadence_replaced
        )
    }
}

/// Collects the timed sensor samples of every trackpoint, sorted by time.
pub fn sensor_samples(tcx: &TcxDocument) -> Vec<SensorSample> {
    let mut samples: Vec<SensorSample> = tcx
        .points()
        .filter_map(|pt| {
            pt.time.map(|time| {
                SensorSample::new(
                    pt.heart_rate.map_or(0, i32::from),
                    pt.cadence.map_or(0, i32::from),
                    time,
                )
            })
        })
        .collect();
    samples.sort_by_key(|s| s.time);
    samples
}

/// Writes heart rate and cadence interpolated from `tcx` onto every timed
/// trackpoint of `gpx`.
///
/// A channel is only written when the TCX carries at least one non-zero value
/// for it. Points without a timestamp are left alone.
pub fn transfer_sensor_data(gpx: &mut GpxDocument, tcx: &TcxDocument) -> Result<TransferReport> {
    let samples = sensor_samples(tcx);
    let do_hr = samples.iter().any(|s| s.heart_rate > 0);
    let do_cad = samples.iter().any(|s| s.cadence > 0);
    if !do_hr && !do_cad {
        return Err(TrackError::NoSensorData);
    }
    debug!(samples = samples.len(), do_hr, do_cad, "Collected TCX sensor samples");

    let mut report = TransferReport::default();
    for point in gpx.track_points_mut() {
        let Some(time) = point.time else {
            continue;
        };
        let Some(sample) = interpolate(&samples, time) else {
            continue;
        };

        if do_hr {
            if point.heart_rate.is_some() {
                report.hr_replaced += 1;
            } else {
                report.hr_added += 1;
            }
            point.heart_rate = Some(clamp_u16(sample.heart_rate));
        }
        if do_cad {
            if point.cadence.is_some() {
                report.cadence_replaced += 1;
            } else {
                report.cadence_added += 1;
            }
            point.cadence = Some(clamp_u16(sample.cadence));
        }
    }

    info!(
        hr_added = report.hr_added,
        hr_replaced = report.hr_replaced,
        cadence_added = report.cadence_added,
        cadence_replaced = report.cadence_replaced,
        "Transferred sensor data"
    );
    Ok(report)
}

fn clamp_u16(value: i32) -> u16 {
    value.clamp(0, i32::from(u16::MAX)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Activity, GpxTrack, Lap, Track, TrackPoint};
    use time::Duration;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-03-10 14:00:00 UTC);

    fn at(secs: i64) -> OffsetDateTime {
        T0 + Duration::seconds(secs)
    }

    #[test]
    fn test_interpolate_midpoint_and_extrapolate() {
        let samples = [SensorSample::new(10, 0, at(0)), SensorSample::new(20, 0, at(10))];
        assert_eq!(interpolate(&samples, at(5)).unwrap().heart_rate, 15);
        assert_eq!(interpolate(&samples, at(20)).unwrap().heart_rate, 30);
    }

    #[test]
    fn test_interpolate_before_start_extrapolates_and_clamps() {
        let samples = [SensorSample::new(10, 80, at(10)), SensorSample::new(20, 90, at(20))];
        let before = interpolate(&samples, at(5)).unwrap();
        assert_eq!(before.heart_rate, 5);
        assert_eq!(before.cadence, 75);

        let far_before = interpolate(&samples, at(-100)).unwrap();
        assert_eq!(far_before.heart_rate, 0);
    }

    #[test]
    fn test_interpolate_degenerate() {
        assert!(interpolate(&[], at(0)).is_none());

        let single = SensorSample::new(99, 50, at(3));
        assert_eq!(interpolate(&[single], at(100)), Some(single));

        let same_time = [SensorSample::new(1, 1, at(0)), SensorSample::new(2, 2, at(0))];
        assert!(interpolate(&same_time, at(5)).is_none());
    }

    #[test]
    fn test_interpolate_exact_sample_wins() {
        let samples = [
            SensorSample::new(100, 60, at(0)),
            SensorSample::new(140, 70, at(10)),
            SensorSample::new(120, 80, at(20)),
        ];
        assert_eq!(interpolate(&samples, at(10)).unwrap().heart_rate, 140);
        assert_eq!(interpolate(&samples, at(15)).unwrap().heart_rate, 130);
        assert_eq!(interpolate(&samples, at(20)).unwrap().heart_rate, 120);
    }

    #[test]
    fn test_interpolate_duplicate_timestamp_at_end_is_undefined() {
        let samples = [
            SensorSample::new(10, 0, at(0)),
            SensorSample::new(20, 0, at(10)),
            SensorSample::new(30, 0, at(10)),
        ];
        assert!(interpolate(&samples, at(10)).is_none());
    }

    #[test]
    fn test_interpolate_duplicate_timestamp_uses_later_sample() {
        let samples = [
            SensorSample::new(10, 0, at(0)),
            SensorSample::new(20, 0, at(10)),
            SensorSample::new(30, 0, at(10)),
            SensorSample::new(40, 0, at(20)),
        ];
        assert_eq!(interpolate(&samples, at(10)).unwrap().heart_rate, 30);
    }

    fn tcx_with(points: Vec<TrackPoint>) -> TcxDocument {
        TcxDocument {
            author: None,
            activities: vec![Activity {
                laps: vec![Lap::with_tracks(vec![Track::new(points)])],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_transfer_counts_added_and_replaced() {
        let tcx = tcx_with(vec![
            TrackPoint::default().with_time(at(0)).with_heart_rate(100),
            TrackPoint::default().with_time(at(10)).with_heart_rate(120),
        ]);
        let mut gpx = GpxDocument {
            tracks: vec![GpxTrack::with_segments(vec![Track::new(vec![
                TrackPoint::new(1.0, 1.0).with_time(at(5)),
                TrackPoint::new(1.0, 1.1).with_time(at(10)).with_heart_rate(90),
                TrackPoint::new(1.0, 1.2),
            ])])],
            ..Default::default()
        };

        let report = transfer_sensor_data(&mut gpx, &tcx).unwrap();
        assert_eq!(report.hr_added, 1);
        assert_eq!(report.hr_replaced, 1);
        assert_eq!(report.cadence_added, 0);

        let points: Vec<_> = gpx.track_points().collect();
        assert_eq!(points[0].heart_rate, Some(110));
        assert_eq!(points[1].heart_rate, Some(120));
        assert_eq!(points[2].heart_rate, None);
        assert!(points.iter().all(|p| p.cadence.is_none()));

        assert_eq!(
            report.to_string(),
            "Added 1 and replaced 1 HR values\n  Added 0 and replaced 0 Cadence values"
        );
    }

    #[test]
    fn test_transfer_without_sensor_data_fails() {
        let tcx = tcx_with(vec![TrackPoint::default().with_time(at(0)).with_heart_rate(0)]);
        let mut gpx = GpxDocument::default();
        assert!(matches!(
            transfer_sensor_data(&mut gpx, &tcx),
            Err(TrackError::NoSensorData)
        ));
    }
}
