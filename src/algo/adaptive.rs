//! Adaptive Strategy Selection
//!
//! Measures the shape of the incoming series and routes it to the strategy
//! best suited for it, or runs all three and merges their detections.
//!
//! Routing rules, in order:
//! - fewer than 15 samples: statistical
//! - 15 to 29 samples: signal processing when the direction spread exceeds 15°, else statistical
//! - regular sampling: signal processing
//! - fast autocorrelation decay: heuristic features
//! - more than 50 samples: ensemble of all three
//! - otherwise signal processing

use crate::algo::angular::{CircularStats, angle_diff};
use crate::algo::filters::autocorrelation;
use crate::algo::heuristic::HeuristicDetector;
use crate::algo::series::WindSeries;
use crate::algo::spectral::SignalProcessingDetector;
use crate::algo::statistical::StatisticalDetector;
use crate::config::DetectorConfig;
use crate::engine::ShiftStrategy;
use crate::sample::{Position, WindSample};
use crate::signal::{ShiftEvent, ShiftType};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

const AUTOCORRELATION_LAG: usize = 5;
const DECAY_LIMIT: f64 = 0.7;
const SPREAD_LIMIT: f64 = 15.0;

/// Shape of a series, measured fresh on every call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataCharacteristics {
    pub sample_count: usize,
    /// Median sampling interval in seconds
    pub median_interval: f64,
    /// Interval standard deviation below half the mean interval
    pub regular: bool,
    /// Circular standard deviation of the direction
    pub direction_std: f64,
    /// One minus the lag-5 autocorrelation of the direction's sine
    pub autocorrelation_decay: f64,
}

impl DataCharacteristics {
    pub fn measure(series: &WindSeries) -> Self {
        let intervals = series.intervals();
        let regular = if intervals.is_empty() {
            false
        } else {
            let n = intervals.len() as f64;
            let mean = intervals.iter().sum::<f64>() / n;
            let var = intervals.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n;
            mean > 0.0 && var.sqrt() < 0.5 * mean
        };

        let direction_std = CircularStats::of(series.directions())
            .filter(|s| s.count > 1)
            .map_or(0.0, |s| s.std);

        // A constant sine has no defined autocorrelation; treat it as fully persistent
        let sines: Vec<f64> = series
            .directions()
            .iter()
            .map(|d| d.to_radians().sin())
            .collect();
        let autocorrelation_decay = 1.0 - autocorrelation(&sines, AUTOCORRELATION_LAG).unwrap_or(1.0);

        Self {
            sample_count: series.len(),
            median_interval: series.median_interval().unwrap_or(0.0),
            regular,
            direction_std,
            autocorrelation_decay,
        }
    }

    pub fn select(&self) -> Selection {
        let n = self.sample_count;
        if n < 15 {
            Selection::Statistical
        } else if n < 30 {
            if self.direction_std > SPREAD_LIMIT {
                Selection::SignalProcessing
            } else {
                Selection::Statistical
            }
        } else if self.regular {
            Selection::SignalProcessing
        } else if self.autocorrelation_decay > DECAY_LIMIT {
            Selection::Heuristic
        } else if n > 50 {
            Selection::Ensemble
        } else {
            Selection::SignalProcessing
        }
    }
}

/// Strategy picked for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Statistical,
    SignalProcessing,
    Heuristic,
    Ensemble,
}

/// Holds one instance of each concrete strategy
pub struct AdaptiveDetector {
    config: DetectorConfig,
    statistical: StatisticalDetector,
    signal_processing: SignalProcessingDetector,
    heuristic: HeuristicDetector,
}

impl AdaptiveDetector {
    pub const MIN_SAMPLES: usize = 10;

    pub fn new(config: DetectorConfig) -> Self {
        Self {
            statistical: StatisticalDetector::new(config.clone()),
            signal_processing: SignalProcessingDetector::new(config.clone()),
            heuristic: HeuristicDetector::new(config.clone()),
            config,
        }
    }

    fn ensemble(&self, samples: &[WindSample]) -> Vec<ShiftEvent> {
        let mut events = self.statistical.detect(samples);
        events.extend(self.signal_processing.detect(samples));
        events.extend(self.heuristic.detect(samples));

        merge_events(events, self.config.merge_window)
            .into_iter()
            .filter(|e| e.direction_change.abs() >= self.config.min_shift_angle)
            .collect()
    }
}

impl ShiftStrategy for AdaptiveDetector {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn min_samples(&self) -> usize {
        Self::MIN_SAMPLES
    }

    fn detect(&self, samples: &[WindSample]) -> Vec<ShiftEvent> {
        if samples.len() < Self::MIN_SAMPLES {
            debug!(samples = samples.len(), "Too few samples for adaptive detection");
            return Vec::new();
        }
        let characteristics = DataCharacteristics::measure(&WindSeries::new(samples));
        let selection = characteristics.select();
        debug!(
            ?selection,
            samples = characteristics.sample_count,
            regular = characteristics.regular,
            direction_std = characteristics.direction_std,
            decay = characteristics.autocorrelation_decay,
            "Adaptive strategy selected"
        );

        match selection {
            Selection::Statistical => self.statistical.detect(samples),
            Selection::SignalProcessing => self.signal_processing.detect(samples),
            Selection::Heuristic => self.heuristic.detect(samples),
            Selection::Ensemble => self.ensemble(samples),
        }
    }
}

/// Merge detections that lie within `horizon_secs` of the running group.
///
/// Directions and speeds are confidence-weighted averages (circular for
/// directions), the confidence is the group maximum, the type is the
/// majority vote with ties going to the first seen, and the timestamp sits
/// halfway between the group's first and last member.
pub fn merge_events(mut events: Vec<ShiftEvent>, horizon_secs: f64) -> Vec<ShiftEvent> {
    events.sort_by_key(|e| e.timestamp);

    let mut groups: Vec<Vec<ShiftEvent>> = Vec::new();
    for event in events {
        match groups.last_mut() {
            Some(group)
                if group.last().is_some_and(|last| {
                    (event.timestamp - last.timestamp).num_milliseconds() as f64 / 1000.0
                        <= horizon_secs
                }) =>
            {
                group.push(event)
            }
            _ => groups.push(vec![event]),
        }
    }

    groups.into_iter().filter_map(merge_group).collect()
}

fn merge_group(group: Vec<ShiftEvent>) -> Option<ShiftEvent> {
    if group.len() == 1 {
        return group.into_iter().next();
    }
    let first = group.first()?.timestamp;
    let last = group.last()?.timestamp;
    let timestamp = first + Duration::milliseconds((last - first).num_milliseconds() / 2);

    let best = group.iter().fold(&group[0], |best, e| {
        if e.confidence > best.confidence { e } else { best }
    });

    let before = CircularStats::weighted(group.iter().map(|e| (e.before_direction, e.confidence)))
        .map_or(best.before_direction, |s| s.mean);
    let after = CircularStats::weighted(group.iter().map(|e| (e.after_direction, e.confidence)))
        .map_or(best.after_direction, |s| s.mean);

    let before_speed = weighted_mean(group.iter().filter_map(|e| e.before_speed.map(|s| (s, e.confidence))));
    let after_speed = weighted_mean(group.iter().filter_map(|e| e.after_speed.map(|s| (s, e.confidence))));
    let position = {
        let weighted: Vec<(Position, f64)> = group
            .iter()
            .filter_map(|e| e.position.map(|p| (p, e.confidence)))
            .collect();
        let lat = weighted_mean(weighted.iter().map(|(p, w)| (p.latitude, *w)));
        let lon = weighted_mean(weighted.iter().map(|(p, w)| (p.longitude, *w)));
        Position::from_parts(lat, lon)
    };

    let merged = ShiftEvent::new(
        timestamp,
        before,
        after,
        best.confidence,
        format!("ensemble:{}", best.detection_method),
    )
    .with_speeds(before_speed, after_speed)
    .with_position(position)
    .with_shift_type(majority_type(&group));

    debug!(
        members = group.len(),
        change = merged.direction_change,
        spread = angle_diff(after, before).abs(),
        "Merged ensemble group"
    );
    Some(merged)
}

/// Weighted mean; falls back to the plain mean when every weight is zero
fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let pairs: Vec<(f64, f64)> = pairs.into_iter().filter(|(v, _)| v.is_finite()).collect();
    if pairs.is_empty() {
        return None;
    }
    let total: f64 = pairs.iter().map(|(_, w)| w.max(0.0)).sum();
    if total > 0.0 {
        Some(pairs.iter().map(|(v, w)| v * w.max(0.0)).sum::<f64>() / total)
    } else {
        Some(pairs.iter().map(|(v, _)| v).sum::<f64>() / pairs.len() as f64)
    }
}

fn majority_type(group: &[ShiftEvent]) -> ShiftType {
    let mut tally: Vec<(ShiftType, usize)> = Vec::new();
    for event in group {
        match tally.iter_mut().find(|(t, _)| *t == event.shift_type) {
            Some((_, count)) => *count += 1,
            None => tally.push((event.shift_type, 1)),
        }
    }
    // Strictly greater keeps the first-seen type on ties
    tally
        .iter()
        .fold(None, |best: Option<(ShiftType, usize)>, &(t, c)| match best {
            Some((_, bc)) if bc >= c => best,
            _ => Some((t, c)),
        })
        .map_or(ShiftType::Unknown, |(t, _)| t)
}
