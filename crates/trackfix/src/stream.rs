//! Reduction of ordered trackpoint segments into totals and channel series.
//!
//! Both the activity summary and the lap recalculation start from this pass.

use serde::Serialize;
use time::OffsetDateTime;

use crate::models::{Position, TrackPoint};
use crate::series::TimeSeries;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Bounds {
    fn at(position: Position) -> Self {
        Self {
            lat_min: position.lat,
            lat_max: position.lat,
            lon_min: position.lon,
            lon_max: position.lon,
        }
    }

    fn extend(&mut self, position: Position) {
        self.lat_min = self.lat_min.min(position.lat);
        self.lat_max = self.lat_max.max(position.lat);
        self.lon_min = self.lon_min.min(position.lon);
        self.lon_max = self.lon_max.max(position.lon);
    }
}

/// Everything a single pass over the points yields.
#[derive(Debug, Clone, Default)]
pub struct StreamReduction {
    /// Meters, summed within segments only.
    pub distance: f64,
    pub segments: usize,
    pub points: usize,
    pub start_time: Option<OffsetDateTime>,
    pub end_time: Option<OffsetDateTime>,
    pub start_position: Option<Position>,
    pub bounds: Option<Bounds>,
    pub start_elevation: Option<f64>,
    /// One sample per consecutive positioned pair, stamped at the pair's midpoint.
    pub speed: TimeSeries<f64>,
    pub elevation: TimeSeries<f64>,
    pub heart_rate: TimeSeries<f64>,
    pub hr_start_time: Option<OffsetDateTime>,
    pub hr_end_time: Option<OffsetDateTime>,
}

impl StreamReduction {
    pub fn hr_values(&self) -> usize {
        self.heart_rate
            .iter()
            .filter(|s| !s.value.is_nan())
            .count()
    }
}

/// Reduces segments in order. Segment breaks go into every series as NaN
/// samples, and no distance is measured across a break.
pub fn reduce_segments<'a, I>(segments: I) -> StreamReduction
where
    I: IntoIterator<Item = &'a [TrackPoint]>,
{
    let mut out = StreamReduction::default();
    let mut last_time: Option<OffsetDateTime> = None;

    for segment in segments {
        if out.segments > 0 {
            out.speed.push_boundary(last_time);
            out.elevation.push_boundary(last_time);
            out.heart_rate.push_boundary(last_time);
        }
        out.segments += 1;

        let mut prev: Option<(Position, Option<OffsetDateTime>)> = None;
        for point in segment {
            out.points += 1;

            if let Some(time) = point.time {
                out.start_time.get_or_insert(time);
                out.end_time = Some(time);
                last_time = Some(time);
            }

            if let Some(position) = point.position {
                out.start_position.get_or_insert(position);
                match out.bounds.as_mut() {
                    Some(bounds) => bounds.extend(position),
                    None => out.bounds = Some(Bounds::at(position)),
                }

                if let Some((prev_position, prev_time)) = prev {
                    let delta = prev_position.distance_to(&position);
                    out.distance += delta;
                    if let (Some(t0), Some(t1)) = (prev_time, point.time) {
                        let dt = (t1 - t0).as_seconds_f64();
                        let speed = if dt > 0.0 { delta / dt } else { 0.0 };
                        out.speed.push(speed, Some(t0 + (t1 - t0) / 2));
                    }
                }
                prev = Some((position, point.time));
            }

            if let Some(elevation) = point.elevation {
                out.start_elevation.get_or_insert(elevation);
                out.elevation.push(elevation, point.time);
            }

            if let (Some(hr), Some(time)) = (point.heart_rate_bpm(), point.time) {
                out.hr_start_time.get_or_insert(time);
                out.hr_end_time = Some(time);
                out.heart_rate.push(f64::from(hr), Some(time));
            }
        }
    }

    out
}
