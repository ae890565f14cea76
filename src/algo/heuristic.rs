//! Heuristic-Feature Shift Detector
//!
//! Rolling direction/speed features are combined with fixed linear weights
//! and squashed through a logistic function into a shift probability per
//! interior sample. Nearby candidates are merged in time and the survivors
//! are re-measured over wider windows.

use crate::algo::angular::{CircularStats, angle_diff};
use crate::algo::series::WindSeries;
use crate::config::{DetectorConfig, FeatureWeights};
use crate::engine::ShiftStrategy;
use crate::sample::WindSample;
use crate::signal::{ShiftEvent, ShiftType};
use std::ops::Range;
use tracing::debug;

/// Rolling windows (samples) of the feature frame
pub const FEATURE_WINDOWS: [usize; 3] = [3, 5, 10];
const SHORT: usize = 5;
const LONG: usize = 10;

// Feature normalization scales
const DIR_CHANGE_SHORT_SCALE: f64 = 15.0;
const DIR_CHANGE_LONG_SCALE: f64 = 30.0;
const DIR_STD_SHORT_SCALE: f64 = 15.0;
const DIR_STD_LONG_SCALE: f64 = 20.0;
/// Slope change (degrees per second) at which the trend feature saturates
const TREND_SCALE: f64 = 0.5;

const LOGISTIC_GAIN: f64 = 8.0;
const LOGISTIC_MIDPOINT: f64 = 0.2;

const MIN_SIDE_SAMPLES: usize = 3;

/// Trailing rolling statistics over one window length
#[derive(Debug, Clone)]
pub struct RollingFeatures {
    pub window: usize,
    pub direction_mean: Vec<f64>,
    pub direction_std: Vec<f64>,
    pub speed_mean: Vec<Option<f64>>,
    /// Degrees per second between this window's mean and the one `window` samples earlier
    pub change_rate: Vec<f64>,
}

/// Per-sample rolling features over the 3/5/10 sample windows
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    windows: Vec<RollingFeatures>,
}

impl FeatureFrame {
    pub fn extract(series: &WindSeries) -> Self {
        let windows = FEATURE_WINDOWS
            .iter()
            .map(|&w| Self::rolling(series, w))
            .collect();
        Self { windows }
    }

    fn rolling(series: &WindSeries, window: usize) -> RollingFeatures {
        let n = series.len();
        let dirs = series.directions();
        let times = series.times();
        let samples = series.samples();

        let mut direction_mean = Vec::with_capacity(n);
        let mut direction_std = Vec::with_capacity(n);
        let mut speed_mean = Vec::with_capacity(n);
        for i in 0..n {
            let start = (i + 1).saturating_sub(window);
            let stats = CircularStats::of(&dirs[start..=i]);
            direction_mean.push(stats.map_or(dirs[i], |s| s.mean));
            direction_std.push(stats.as_ref().map_or(0.0, spread));
            speed_mean.push(mean_speed(&samples[start..=i]));
        }

        let change_rate = (0..n)
            .map(|i| {
                if i < window {
                    return 0.0;
                }
                let dt = times[i] - times[i - window];
                if dt > 0.0 {
                    angle_diff(direction_mean[i], direction_mean[i - window]) / dt
                } else {
                    0.0
                }
            })
            .collect();

        RollingFeatures {
            window,
            direction_mean,
            direction_std,
            speed_mean,
            change_rate,
        }
    }

    pub fn window(&self, window: usize) -> Option<&RollingFeatures> {
        self.windows.iter().find(|w| w.window == window)
    }

    pub fn windows(&self) -> &[RollingFeatures] {
        &self.windows
    }
}

impl RollingFeatures {
    /// Index whose trailing window is `[i, i + window)`, when that fits in `n` samples
    fn ahead(&self, i: usize, n: usize) -> Option<usize> {
        let j = i + self.window - 1;
        (i > 0 && j < n).then_some(j)
    }
}

fn mean_speed(samples: &[WindSample]) -> Option<f64> {
    let (sum, count) = samples
        .iter()
        .filter_map(|s| s.speed)
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn spread(stats: &CircularStats) -> f64 {
    if stats.count > 1 { stats.std } else { 0.0 }
}

/// Normalized features of one candidate sample, each in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShiftFeatures {
    pub trend_change: f64,
    pub dir_change_short: f64,
    pub dir_change_long: f64,
    pub dir_std_short: f64,
    pub dir_std_long: f64,
    pub speed_change: f64,
}

impl ShiftFeatures {
    /// Logistic probability of the weighted feature sum
    pub fn probability(&self, weights: &FeatureWeights) -> f64 {
        let z = weights.trend_change * self.trend_change
            + weights.dir_change_short * self.dir_change_short
            + weights.dir_change_long * self.dir_change_long
            + weights.dir_std_short * self.dir_std_short
            + weights.dir_std_long * self.dir_std_long
            + weights.speed_change * self.speed_change;
        1.0 / (1.0 + (-LOGISTIC_GAIN * (z - LOGISTIC_MIDPOINT)).exp())
    }
}

#[derive(Debug, Clone)]
struct ScoredCandidate {
    index: usize,
    time: f64,
    probability: f64,
    features: ShiftFeatures,
}

pub struct HeuristicDetector {
    config: DetectorConfig,
}

impl HeuristicDetector {
    pub const MIN_SAMPLES: usize = 15;

    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Features of sample `i` against the frame and the samples that follow it
    pub fn features_at(&self, series: &WindSeries, frame: &FeatureFrame, i: usize) -> Option<ShiftFeatures> {
        let n = series.len();
        if i == 0 || i >= n {
            return None;
        }
        let short = frame.window(SHORT)?;
        let long = frame.window(LONG)?;
        let times = series.times();

        // Direction change across `i` and the spread after it, for one window length.
        // Near the end the after window is truncated and measured directly.
        let across = |rolling: &RollingFeatures| -> Option<(f64, f64)> {
            match rolling.ahead(i, n) {
                Some(j) => {
                    let span = times[j] - times[j - rolling.window];
                    Some((rolling.change_rate[j] * span, rolling.direction_std[j]))
                }
                None => {
                    let after = CircularStats::of(&series.directions()[i..])?;
                    Some((angle_diff(after.mean, rolling.direction_mean[i - 1]), spread(&after)))
                }
            }
        };
        let (change_short, after_std_short) = across(short)?;
        let (change_long, after_std_long) = across(long)?;
        let std_short = (short.direction_std[i - 1] + after_std_short) / 2.0;
        let std_long = (long.direction_std[i - 1] + after_std_long) / 2.0;

        let after_speed = match short.ahead(i, n) {
            Some(j) => short.speed_mean[j],
            None => mean_speed(&series.samples()[i..]),
        };
        let speed_change = match (short.speed_mean[i - 1], after_speed) {
            (Some(b), Some(a)) if b > 0.0 => ((a - b).abs() / b).min(1.0),
            _ => 0.0,
        };
        let before_long: Range<usize> = i.saturating_sub(LONG)..i;
        let trend_change = match (series.slope(before_long), series.slope(i..(i + LONG).min(n))) {
            (Some(b), Some(a)) => ((a - b).abs() / TREND_SCALE).min(1.0),
            _ => 0.0,
        };

        Some(ShiftFeatures {
            trend_change,
            dir_change_short: (change_short.abs() / DIR_CHANGE_SHORT_SCALE).min(1.0),
            dir_change_long: (change_long.abs() / DIR_CHANGE_LONG_SCALE).min(1.0),
            dir_std_short: (std_short / DIR_STD_SHORT_SCALE).min(1.0),
            dir_std_long: (std_long / DIR_STD_LONG_SCALE).min(1.0),
            speed_change,
        })
    }

    fn score(&self, series: &WindSeries) -> Vec<ScoredCandidate> {
        let n = series.len();
        let frame = FeatureFrame::extract(series);
        let weights = &self.config.feature_weights;

        (SHORT..n.saturating_sub(SHORT))
            .filter_map(|i| {
                let features = self.features_at(series, &frame, i)?;
                let probability = features.probability(weights);
                (probability >= self.config.confidence_threshold).then(|| ScoredCandidate {
                    index: i,
                    time: series.times()[i],
                    probability,
                    features,
                })
            })
            .collect()
    }

    /// Keep the most probable candidate of each cluster in time
    fn merge(&self, candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
        let mut merged: Vec<ScoredCandidate> = Vec::new();
        let mut group_last: Option<f64> = None;

        for candidate in candidates {
            let joins = group_last.is_some_and(|t| candidate.time - t <= self.config.merge_window);
            group_last = Some(candidate.time);
            match merged.last_mut() {
                Some(best) if joins => {
                    if candidate.probability > best.probability {
                        *best = candidate;
                    }
                }
                _ => merged.push(candidate),
            }
        }
        merged
    }

    fn finalize(&self, series: &WindSeries, candidate: &ScoredCandidate) -> Option<ShiftEvent> {
        let window = self.config.context_window;
        let before = series.before(candidate.index, window);
        let after = series.after(candidate.index, window);
        if before.len() < MIN_SIDE_SAMPLES || after.len() < MIN_SIDE_SAMPLES {
            return None;
        }
        let before = series.side(before)?;
        let after = series.side(after)?;
        let change = angle_diff(after.direction.mean, before.direction.mean);
        if !self.config.accepts(change, candidate.probability) {
            return None;
        }

        let shift_type = Self::classify(&candidate.features, change);
        Some(
            series
                .event_at(candidate.index, &before, &after, candidate.probability, self.name())
                .with_shift_type(shift_type),
        )
    }

    fn classify(features: &ShiftFeatures, change: f64) -> ShiftType {
        if features.trend_change > 0.6 {
            ShiftType::Trend
        } else if features.dir_std_short > 0.5 || features.dir_std_long > 0.6 {
            ShiftType::Oscillation
        } else if change.abs() > 12.0 {
            ShiftType::Persistent
        } else {
            ShiftType::Phase
        }
    }
}

impl ShiftStrategy for HeuristicDetector {
    fn name(&self) -> &'static str {
        "machine_learning"
    }

    fn min_samples(&self) -> usize {
        Self::MIN_SAMPLES
    }

    fn detect(&self, samples: &[WindSample]) -> Vec<ShiftEvent> {
        if samples.len() < Self::MIN_SAMPLES {
            debug!(samples = samples.len(), "Too few samples for heuristic detection");
            return Vec::new();
        }
        let series = WindSeries::new(samples);
        let scored = self.score(&series);
        let scored_count = scored.len();
        let merged = self.merge(scored);

        let events: Vec<ShiftEvent> = merged
            .iter()
            .filter_map(|c| self.finalize(&series, c))
            .collect();

        debug!(
            candidates = scored_count,
            merged = merged.len(),
            emitted = events.len(),
            "Heuristic detection finished"
        );
        events
    }
}
