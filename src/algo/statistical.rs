//! Statistical Shift Detector
//!
//! Finds large single-step changes in the smoothed direction and validates
//! each one by comparing circular statistics of the windows immediately
//! before and after it.

use crate::algo::angular::{angle_diff, circular_smooth};
use crate::algo::series::{WindSeries, WindowSide};
use crate::config::DetectorConfig;
use crate::engine::ShiftStrategy;
use crate::sample::WindSample;
use crate::signal::{ShiftEvent, ShiftType};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Minimum number of samples per side for a candidate to be evaluated
const MIN_SIDE_SAMPLES: usize = 3;
/// Below this many after-window samples the shift stays UNKNOWN
const MIN_CLASSIFY_SAMPLES: usize = 5;
/// Combined window spread (degrees) at which consistency reaches zero
const CONSISTENCY_SPREAD: f64 = 30.0;
/// Change (degrees) at which the magnitude term saturates
const MAGNITUDE_SCALE: f64 = 20.0;
const SPEED_BOOST_RATIO: f64 = 0.2;
const SPEED_BOOST: f64 = 1.2;
/// Slope change (degrees per second) that marks a TREND
const TREND_SLOPE_DELTA: f64 = 0.1;
const OSCILLATION_STD: f64 = 8.0;
const PERSISTENT_CHANGE: f64 = 10.0;

pub struct StatisticalDetector {
    config: DetectorConfig,
}

impl StatisticalDetector {
    pub const MIN_SAMPLES: usize = 10;

    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Indices where the smoothed direction jumps by more than the minimum shift
    fn candidates(&self, series: &WindSeries) -> Vec<usize> {
        let smoothed = circular_smooth(series.directions(), self.config.smoothing_window);
        (1..smoothed.len())
            .filter(|&i| angle_diff(smoothed[i], smoothed[i - 1]).abs() > self.config.min_shift_angle)
            .collect()
    }

    fn evaluate(&self, series: &WindSeries, i: usize) -> Option<ShiftEvent> {
        let window = self.config.statistical_window();
        let before = series.before(i, window);
        let after = series.after(i, window);
        if before.len() < MIN_SIDE_SAMPLES || after.len() < MIN_SIDE_SAMPLES {
            return None;
        }
        let before = series.side(before)?;
        let after = series.side(after)?;

        let change = angle_diff(after.direction.mean, before.direction.mean);
        let consistency =
            1.0 - ((before.direction.std + after.direction.std) / CONSISTENCY_SPREAD).min(1.0);
        let magnitude = (change.abs() / MAGNITUDE_SCALE).min(1.0);
        let mut confidence = 0.6 * consistency + 0.4 * magnitude;

        if let (Some(b), Some(a)) = (before.speed, after.speed) {
            if b > 0.0 && (a - b).abs() / b > SPEED_BOOST_RATIO {
                confidence = (confidence * SPEED_BOOST).min(1.0);
            }
        }

        if confidence <= self.config.confidence_threshold
            || change.abs() < self.config.min_shift_angle
        {
            return None;
        }

        let shift_type = self.classify(series, &before, &after, change);
        Some(
            series
                .event_at(i, &before, &after, confidence, self.name())
                .with_shift_type(shift_type),
        )
    }

    fn classify(
        &self,
        series: &WindSeries,
        before: &WindowSide,
        after: &WindowSide,
        change: f64,
    ) -> ShiftType {
        if after.len() < MIN_CLASSIFY_SAMPLES {
            return ShiftType::Unknown;
        }

        match (
            series.slope(before.range.clone()),
            series.slope(after.range.clone()),
        ) {
            (Some(b), Some(a)) if (a - b).abs() > TREND_SLOPE_DELTA => return ShiftType::Trend,
            (Some(_), Some(_)) => {}
            _ => debug!("Slope fit degenerate, classifying by magnitude"),
        }

        if after.direction.std > OSCILLATION_STD {
            ShiftType::Oscillation
        } else if change.abs() > PERSISTENT_CHANGE {
            ShiftType::Persistent
        } else {
            ShiftType::Phase
        }
    }

    /// Collapse candidates describing the same step, keeping the most confident
    fn dedupe(&self, events: Vec<ShiftEvent>, horizon_secs: f64) -> Vec<ShiftEvent> {
        let mut kept: Vec<ShiftEvent> = Vec::with_capacity(events.len());
        let mut group_last: Option<DateTime<Utc>> = None;

        for event in events {
            let joins = group_last.is_some_and(|last| {
                (event.timestamp - last).num_milliseconds() as f64 / 1000.0 <= horizon_secs
            });
            group_last = Some(event.timestamp);
            match kept.last_mut() {
                Some(best) if joins => {
                    if event.confidence > best.confidence {
                        *best = event;
                    }
                }
                _ => kept.push(event),
            }
        }
        kept
    }
}

impl ShiftStrategy for StatisticalDetector {
    fn name(&self) -> &'static str {
        "statistical"
    }

    fn min_samples(&self) -> usize {
        Self::MIN_SAMPLES
    }

    fn detect(&self, samples: &[WindSample]) -> Vec<ShiftEvent> {
        if samples.len() < Self::MIN_SAMPLES {
            debug!(samples = samples.len(), "Too few samples for statistical detection");
            return Vec::new();
        }
        let series = WindSeries::new(samples);
        let candidates = self.candidates(&series);

        let events: Vec<ShiftEvent> = candidates
            .iter()
            .filter_map(|&i| self.evaluate(&series, i))
            .collect();

        // A smoothed step spans roughly one smoothing window of samples
        let spread = series.median_interval().unwrap_or(0.0) * self.config.smoothing_window as f64;
        let events = self.dedupe(events, self.config.merge_window.max(spread));

        debug!(
            candidates = candidates.len(),
            emitted = events.len(),
            "Statistical detection finished"
        );
        events
    }
}
