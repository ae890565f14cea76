//! Time-ordered working copy of the wind samples
//!
//! Detectors never touch caller data: each detection call builds a
//! `WindSeries` (sorted clone plus relative times in seconds) and slices
//! before/after windows out of it.

use crate::algo::angular::{CircularStats, angle_diff, direction_slope};
use crate::sample::WindSample;
use crate::signal::ShiftEvent;
use std::ops::Range;

/// Summary of one side (before or after) of a candidate shift
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSide {
    pub range: Range<usize>,
    pub direction: CircularStats,
    pub speed: Option<f64>,
}

impl WindowSide {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct WindSeries {
    samples: Vec<WindSample>,
    times: Vec<f64>,
    directions: Vec<f64>,
}

impl WindSeries {
    pub fn new(samples: &[WindSample]) -> Self {
        let mut samples = samples.to_vec();
        samples.sort_by_key(|s| s.timestamp);

        let origin = samples.first().map(|s| s.timestamp);
        let times = samples
            .iter()
            .map(|s| match origin {
                Some(t0) => (s.timestamp - t0).num_milliseconds() as f64 / 1000.0,
                None => 0.0,
            })
            .collect();
        let directions = samples.iter().map(|s| s.direction).collect();

        Self {
            samples,
            times,
            directions,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[WindSample] {
        &self.samples
    }

    /// Seconds since the first sample
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn directions(&self) -> &[f64] {
        &self.directions
    }

    /// Gaps between consecutive samples in seconds
    pub fn intervals(&self) -> Vec<f64> {
        self.times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Median of the strictly positive sampling intervals
    pub fn median_interval(&self) -> Option<f64> {
        let mut gaps: Vec<f64> = self.intervals().into_iter().filter(|g| *g > 0.0).collect();
        if gaps.is_empty() {
            return None;
        }
        gaps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = gaps.len() / 2;
        Some(if gaps.len() % 2 == 0 {
            (gaps[mid - 1] + gaps[mid]) / 2.0
        } else {
            gaps[mid]
        })
    }

    /// Indices with `t_i - seconds <= t < t_i`
    pub fn before(&self, i: usize, seconds: f64) -> Range<usize> {
        let t = self.times[i];
        let start = self.times.partition_point(|&x| x < t - seconds);
        let end = self.times.partition_point(|&x| x < t);
        start..end
    }

    /// Indices with `t_i <= t < t_i + seconds`
    pub fn after(&self, i: usize, seconds: f64) -> Range<usize> {
        let t = self.times[i];
        let start = self.times.partition_point(|&x| x < t);
        let end = self.times.partition_point(|&x| x < t + seconds);
        start..end
    }

    /// Circular direction stats and mean speed over a range
    pub fn side(&self, range: Range<usize>) -> Option<WindowSide> {
        let direction = CircularStats::of(&self.directions[range.clone()])?;
        let speeds: Vec<f64> = self.samples[range.clone()]
            .iter()
            .filter_map(|s| s.speed)
            .collect();
        let speed = (!speeds.is_empty()).then(|| speeds.iter().sum::<f64>() / speeds.len() as f64);
        Some(WindowSide {
            range,
            direction,
            speed,
        })
    }

    /// Direction trend (degrees per second) over a range
    pub fn slope(&self, range: Range<usize>) -> Option<f64> {
        direction_slope(&self.times[range.clone()], &self.directions[range])
    }

    /// Deviations from a reference direction over a range
    pub fn residuals(&self, range: Range<usize>, reference: f64) -> Vec<f64> {
        self.directions[range]
            .iter()
            .map(|&d| angle_diff(d, reference))
            .collect()
    }

    /// Build an event at sample `i` from its two window summaries
    pub fn event_at(
        &self,
        i: usize,
        before: &WindowSide,
        after: &WindowSide,
        confidence: f64,
        method: &str,
    ) -> ShiftEvent {
        let sample = &self.samples[i];
        ShiftEvent::new(
            sample.timestamp,
            before.direction.mean,
            after.direction.mean,
            confidence,
            method,
        )
        .with_speeds(before.speed, after.speed)
        .with_position(sample.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn series(dirs: &[f64], step_s: i64) -> WindSeries {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let samples: Vec<WindSample> = dirs
            .iter()
            .enumerate()
            .rev()
            .map(|(i, &d)| WindSample::new(t0 + chrono::Duration::seconds(i as i64 * step_s), d))
            .collect();
        WindSeries::new(&samples)
    }

    #[test]
    fn test_series_is_sorted_copy() {
        let s = series(&[10.0, 20.0, 30.0], 5);
        assert_eq!(s.directions(), &[10.0, 20.0, 30.0]);
        assert_eq!(s.times(), &[0.0, 5.0, 10.0]);
        assert_eq!(s.median_interval(), Some(5.0));
    }

    #[test]
    fn test_windows_are_half_open() {
        let s = series(&[0.0; 10], 10);
        assert_eq!(s.before(5, 30.0), 2..5);
        assert_eq!(s.after(5, 30.0), 5..8);
        assert_eq!(s.before(0, 30.0), 0..0);
        assert_eq!(s.after(9, 30.0), 9..10);
    }

    #[test]
    fn test_side_stats_and_speed() {
        let t0 = Utc.timestamp_opt(0, 0).unwrap();
        let samples = vec![
            WindSample::new(t0, 350.0).with_speed(10.0),
            WindSample::new(t0 + chrono::Duration::seconds(1), 10.0),
            WindSample::new(t0 + chrono::Duration::seconds(2), 0.0).with_speed(14.0),
        ];
        let s = WindSeries::new(&samples);
        let side = s.side(0..3).unwrap();
        assert!(angle_diff(side.direction.mean, 0.0).abs() < 1e-9);
        assert_eq!(side.speed, Some(12.0));
        assert!(s.side(1..1).is_none());
    }
}
