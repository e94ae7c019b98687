//! Trackpoint deletion and time shifting for TCX documents.

use std::fmt;

use time::macros::format_description;
use time::{Duration, OffsetDateTime};
use tracing::info;

use crate::config::DeviceProfile;
use crate::errors::{Result, TrackError};
use crate::models::{Outcome, TcxDocument, TimeWindow};
use crate::recalc::recalculate;

fn fmt_u(time: OffsetDateTime) -> std::result::Result<String, fmt::Error> {
    time.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]Z"
    ))
    .map_err(|_| fmt::Error)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteReport {
    pub first_index: usize,
    pub last_index: usize,
    pub first_time: OffsetDateTime,
    pub last_time: OffsetDateTime,
    pub deleted: usize,
}

impl fmt::Display for DeleteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Deleted {} trackpoints from trackpoint {} to {} [{} to {}]",
            self.deleted,
            self.first_index,
            self.last_index,
            fmt_u(self.first_time)?,
            fmt_u(self.last_time)?
        )
    }
}

/// Removes the trackpoints of the first track of the first lap of the first
/// activity whose time lies in `window`, then recalculates.
pub fn delete_points_in_window(
    tcx: &mut TcxDocument,
    window: Option<TimeWindow>,
    device: &DeviceProfile,
) -> Result<Outcome<DeleteReport>> {
    let Some(window) = window else {
        return Ok(Outcome::Aborted);
    };
    if tcx.activities.is_empty() {
        return Err(TrackError::NoActivities);
    }
    let track = tcx.primary_track_mut().ok_or(TrackError::NoTrackPoints)?;

    let doomed: Vec<(usize, OffsetDateTime)> = track
        .points
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.time.filter(|t| window.contains(*t)).map(|t| (i, t)))
        .collect();
    let (Some(&(first_index, first_time)), Some(&(last_index, last_time))) =
        (doomed.first(), doomed.last())
    else {
        return Err(TrackError::NoPointsInWindow);
    };

    track
        .points
        .retain(|p| !p.time.is_some_and(|t| window.contains(t)));
    recalculate(tcx, device);

    let report = DeleteReport {
        first_index,
        last_index,
        first_time,
        last_time,
        deleted: doomed.len(),
    };
    info!(deleted = report.deleted, first_index, last_index, "Deleted trackpoints");
    Ok(Outcome::Completed(report))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShiftReport {
    pub old_start: OffsetDateTime,
    pub new_start: OffsetDateTime,
    pub shifted: usize,
}

impl ShiftReport {
    pub fn delta(&self) -> Duration {
        self.new_start - self.old_start
    }
}

impl fmt::Display for ShiftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Changed start time from {} to {} ({} trackpoints)",
            fmt_u(self.old_start)?,
            fmt_u(self.new_start)?,
            self.shifted
        )
    }
}

/// Moves every trackpoint time by the same amount so the activity starts at
/// `new_start`, then recalculates.
pub fn shift_start_time(
    tcx: &mut TcxDocument,
    new_start: Option<OffsetDateTime>,
    device: &DeviceProfile,
) -> Result<Outcome<ShiftReport>> {
    let Some(new_start) = new_start else {
        return Ok(Outcome::Aborted);
    };
    if tcx.activities.is_empty() {
        return Err(TrackError::NoActivities);
    }
    let old_start = tcx
        .points()
        .find_map(|p| p.time)
        .ok_or(TrackError::NoTimestamps)?;
    let delta = new_start - old_start;

    let mut shifted = 0;
    for point in tcx
        .activities
        .iter_mut()
        .flat_map(|a| a.laps.iter_mut())
        .flat_map(|l| l.tracks.iter_mut())
        .flat_map(|t| t.points.iter_mut())
    {
        if let Some(time) = point.time.as_mut() {
            *time += delta;
            shifted += 1;
        }
    }
    recalculate(tcx, device);

    info!(%delta, shifted, "Shifted trackpoint times");
    Ok(Outcome::Completed(ShiftReport {
        old_start,
        new_start,
        shifted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Activity, Lap, Track, TrackPoint};
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2021-04-18 06:45:00 UTC);

    fn at(secs: i64) -> OffsetDateTime {
        T0 + Duration::seconds(secs)
    }

    fn doc(n: i64) -> TcxDocument {
        let points = (0..n)
            .map(|i| TrackPoint::new(45.0 + 0.0001 * i as f64, 9.0).with_time(at(i * 10)))
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
    fn test_delete_window() {
        let mut tcx = doc(10);
        let report = delete_points_in_window(
            &mut tcx,
            Some(TimeWindow::new(at(25), at(60))),
            &DeviceProfile::polar(),
        )
        .unwrap()
        .completed()
        .unwrap();

        assert_eq!(report.deleted, 4);
        assert_eq!((report.first_index, report.last_index), (3, 6));
        assert_eq!(report.first_time, at(30));
        assert_eq!(report.last_time, at(60));
        assert_eq!(
            report.to_string(),
            "Deleted 4 trackpoints from trackpoint 3 to 6 [2021-04-18 06:45:30Z to 2021-04-18 06:46:00Z]"
        );

        let times: Vec<_> = tcx.points().filter_map(|p| p.time).collect();
        assert_eq!(times, vec![at(0), at(10), at(20), at(70), at(80), at(90)]);
        let lap = &tcx.activities[0].laps[0];
        assert_eq!(lap.total_time_seconds, 91.0);
    }

    #[test]
    fn test_delete_outside_window_fails() {
        let mut tcx = doc(3);
        let before = tcx.clone();
        let result = delete_points_in_window(
            &mut tcx,
            Some(TimeWindow::new(at(500), at(600))),
            &DeviceProfile::polar(),
        );
        assert!(matches!(result, Err(TrackError::NoPointsInWindow)));
        assert_eq!(tcx, before);

        let aborted = delete_points_in_window(&mut tcx, None, &DeviceProfile::polar()).unwrap();
        assert!(aborted.is_aborted());
    }

    #[test]
    fn test_shift_start_time() {
        let mut tcx = doc(3);
        let new_start = datetime!(2021-04-18 08:00:00 UTC);
        let report = shift_start_time(&mut tcx, Some(new_start), &DeviceProfile::neutral())
            .unwrap()
            .completed()
            .unwrap();

        assert_eq!(report.shifted, 3);
        assert_eq!(report.delta(), Duration::minutes(75));
        let times: Vec<_> = tcx.points().filter_map(|p| p.time).collect();
        assert_eq!(
            times,
            vec![new_start, new_start + Duration::seconds(10), new_start + Duration::seconds(20)]
        );
        assert_eq!(tcx.activities[0].id, Some(new_start));
        assert_eq!(tcx.activities[0].laps[0].start_time, Some(new_start));
    }

    #[test]
    fn test_shift_requires_timestamps() {
        let mut tcx = TcxDocument {
            author: None,
            activities: vec![Activity {
                laps: vec![Lap::with_tracks(vec![Track::new(vec![TrackPoint::new(
                    1.0, 1.0,
                )])])],
                ..Default::default()
            }],
        };
        let result = shift_start_time(&mut tcx, Some(T0), &DeviceProfile::polar());
        assert!(matches!(result, Err(TrackError::NoTimestamps)));
    }
}
