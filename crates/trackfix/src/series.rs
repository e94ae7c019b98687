//! Value/timestamp series and the statistics computed over them.
//!
//! A series keeps each value paired with its timestamp. Segment breaks are
//! explicit NaN samples carrying the last known timestamp so the series keeps
//! its overall ordering while statistics treat segments independently.

use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<T> {
    pub value: T,
    pub time: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries<T> {
    samples: Vec<Sample<T>>,
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
        }
    }
}

impl<T: Copy> TimeSeries<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs parallel value and time sequences; `None` when their lengths differ.
    pub fn from_parts(values: Vec<T>, times: Vec<Option<OffsetDateTime>>) -> Option<Self> {
        if values.len() != times.len() {
            return None;
        }
        let samples = values
            .into_iter()
            .zip(times)
            .map(|(value, time)| Sample { value, time })
            .collect();
        Some(Self { samples })
    }

    pub fn push(&mut self, value: T, time: Option<OffsetDateTime>) {
        self.samples.push(Sample { value, time });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample<T>] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample<T>> {
        self.samples.iter()
    }
}

impl TimeSeries<f64> {
    /// Appends a segment break.
    pub fn push_boundary(&mut self, last_known: Option<OffsetDateTime>) {
        self.push(f64::NAN, last_known);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl SeriesStats {
    const ZERO: SeriesStats = SeriesStats {
        min: 0.0,
        max: 0.0,
        avg: 0.0,
    };
}

/// Unweighted statistics over samples that are not NaN and not below
/// `omit_below`.
///
/// An empty series yields all zeros; a series with no qualifying sample
/// yields `None`.
pub fn simple_stats(series: &TimeSeries<f64>, omit_below: f64) -> Option<SeriesStats> {
    if series.is_empty() {
        return Some(SeriesStats::ZERO);
    }

    let mut min = f64::MAX;
    let mut max = f64::MIN;
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in series.iter().map(|s| s.value) {
        if value.is_nan() || value < omit_below {
            continue;
        }
        count += 1;
        sum += value;
        min = min.min(value);
        max = max.max(value);
    }

    if count == 0 {
        return None;
    }
    Some(SeriesStats {
        min,
        max,
        avg: sum / count as f64,
    })
}

/// Statistics weighted by the time each sample represents.
///
/// The first sample weighs half the gap to its successor; every later sample
/// weighs half the gap to its predecessor. Any NaN anywhere in the series, a
/// missing timestamp, or a zero total weight yields `None`.
pub fn time_weighted_stats(series: &TimeSeries<f64>, omit_below: f64) -> Option<SeriesStats> {
    let samples = series.samples();
    match samples {
        [] => return Some(SeriesStats::ZERO),
        [only] => {
            return Some(SeriesStats {
                min: only.value,
                max: only.value,
                avg: only.value,
            });
        }
        _ => {}
    }

    if samples.iter().any(|s| s.value.is_nan()) {
        return None;
    }
    let times: Vec<OffsetDateTime> = samples.iter().map(|s| s.time).collect::<Option<_>>()?;
    let secs = |a: OffsetDateTime, b: OffsetDateTime| (b - a).as_seconds_f64();

    let mut min = f64::MAX;
    let mut max = f64::MIN;
    let mut sum = 0.0;
    let mut total_weight = 0.0;
    for (i, sample) in samples.iter().enumerate() {
        let value = sample.value;
        if value < omit_below {
            continue;
        }
        let weight = if i == 0 {
            0.5 * secs(times[0], times[1])
        } else {
            0.5 * secs(times[i - 1], times[i])
        };
        total_weight += weight;
        sum += value * weight;
        min = min.min(value);
        max = max.max(value);
    }

    if total_weight == 0.0 {
        return None;
    }
    Some(SeriesStats {
        min,
        max,
        avg: sum / total_weight,
    })
}

/// Time-weighted statistics, falling back to the simple average when the
/// weighted computation has no result.
pub fn stats_with_fallback(series: &TimeSeries<f64>, omit_below: f64) -> Option<SeriesStats> {
    time_weighted_stats(series, omit_below).or_else(|| {
        debug!(
            samples = series.len(),
            omit_below, "Time-weighted stats unavailable, using simple average"
        );
        simple_stats(series, omit_below)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElevationChange {
    pub gain: f64,
    pub loss: f64,
}

/// Total climb and descent over consecutive deltas. Deltas touching a NaN
/// are skipped, so segment breaks never count as a climb.
pub fn elevation_change(series: &TimeSeries<f64>) -> Option<ElevationChange> {
    if series.is_empty() {
        return Some(ElevationChange {
            gain: 0.0,
            loss: 0.0,
        });
    }

    let mut gain = 0.0;
    let mut loss = 0.0;
    let mut deltas = 0usize;
    for pair in series.samples().windows(2) {
        let delta = pair[1].value - pair[0].value;
        if delta.is_nan() {
            continue;
        }
        deltas += 1;
        if delta > 0.0 {
            gain += delta;
        } else {
            loss -= delta;
        }
    }

    (deltas > 0).then_some(ElevationChange { gain, loss })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    fn series(values: &[f64], step_secs: i64) -> TimeSeries<f64> {
        let start = datetime!(2024-06-01 08:00:00 UTC);
        let mut series = TimeSeries::new();
        for (i, value) in values.iter().enumerate() {
            series.push(*value, Some(start + Duration::seconds(step_secs * i as i64)));
        }
        series
    }

    #[test]
    fn test_from_parts_rejects_mismatch() {
        assert!(TimeSeries::from_parts(vec![1.0, 2.0], vec![None]).is_none());
        let series = TimeSeries::from_parts(vec![1.0], vec![None]).unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_simple_stats_omit_below() {
        let stats = simple_stats(&series(&[0.2, 0.6, 0.9], 1), 0.5).unwrap();
        assert_eq!(stats.min, 0.6);
        assert_eq!(stats.max, 0.9);
        assert!((stats.avg - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_simple_stats_edge_cases() {
        assert_eq!(
            simple_stats(&TimeSeries::new(), 0.0),
            Some(SeriesStats::ZERO)
        );
        assert_eq!(simple_stats(&series(&[f64::NAN, 0.1], 1), 0.5), None);

        let stats = simple_stats(&series(&[1.0, f64::NAN, 3.0], 1), 0.0).unwrap();
        assert_eq!(stats.avg, 2.0);
    }

    #[test]
    fn test_two_point_weighted_average_is_mean() {
        for step in [1, 7, 3600] {
            let stats = time_weighted_stats(&series(&[4.0, 10.0], step), 0.0).unwrap();
            assert!((stats.avg - 7.0).abs() < 1e-12);
            assert_eq!(stats.min, 4.0);
            assert_eq!(stats.max, 10.0);
        }
    }

    #[test]
    fn test_weighted_uses_backward_gap() {
        // Gaps 10 s then 30 s; weights 5, 5, 15.
        let start = datetime!(2024-06-01 08:00:00 UTC);
        let mut s = TimeSeries::new();
        s.push(1.0, Some(start));
        s.push(2.0, Some(start + Duration::seconds(10)));
        s.push(3.0, Some(start + Duration::seconds(40)));

        let stats = time_weighted_stats(&s, 0.0).unwrap();
        let expected = (1.0 * 5.0 + 2.0 * 5.0 + 3.0 * 15.0) / 25.0;
        assert!((stats.avg - expected).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_fails_on_any_nan() {
        let s = series(&[1.0, f64::NAN, 3.0], 5);
        assert_eq!(time_weighted_stats(&s, 0.0), None);

        let fallback = stats_with_fallback(&s, 0.0).unwrap();
        assert_eq!(fallback.avg, 2.0);
    }

    #[test]
    fn test_weighted_fails_without_times() {
        let s = TimeSeries::from_parts(vec![1.0, 2.0], vec![None, None]).unwrap();
        assert_eq!(time_weighted_stats(&s, 0.0), None);
        assert_eq!(stats_with_fallback(&s, 0.0).unwrap().avg, 1.5);
    }

    #[test]
    fn test_weighted_zero_weight() {
        // All samples at the same instant.
        let s = series(&[1.0, 2.0, 3.0], 0);
        assert_eq!(time_weighted_stats(&s, 0.0), None);
    }

    #[test]
    fn test_boundary_is_nan_with_last_time() {
        let t = datetime!(2024-06-01 08:00:00 UTC);
        let mut s = TimeSeries::new();
        s.push(5.0, Some(t));
        s.push_boundary(Some(t));
        assert!(s.samples()[1].value.is_nan());
        assert_eq!(s.samples()[1].time, Some(t));
    }

    #[test]
    fn test_elevation_gain_loss() {
        let change = elevation_change(&series(&[100.0, 110.0, 105.0, 120.0], 1)).unwrap();
        assert_eq!(change.gain, 25.0);
        assert_eq!(change.loss, 5.0);
    }

    #[test]
    fn test_elevation_skips_boundaries() {
        let change =
            elevation_change(&series(&[100.0, 110.0, f64::NAN, 50.0, 40.0], 1)).unwrap();
        assert_eq!(change.gain, 10.0);
        assert_eq!(change.loss, 10.0);

        assert_eq!(elevation_change(&series(&[100.0], 1)), None);
    }
}
