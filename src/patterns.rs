//! Aggregate Pattern Analysis
//!
//! Summarizes a set of already-detected shifts: how regularly they occur,
//! whether they swing back and forth, which way they mostly go and which
//! type dominates.

use crate::signal::{ShiftEvent, ShiftType};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Interval std below this share of the mean marks the shifts as periodic
const PERIODIC_SPREAD: f64 = 0.4;
/// Share of adjacent sign flips that marks the shifts as oscillating
const OSCILLATION_RATIO: f64 = 0.4;
/// One side must outnumber the other by this factor to dominate
const DOMINANCE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DominantDirection {
    /// Mostly veers (clockwise)
    Positive,
    /// Mostly backs (counter-clockwise)
    Negative,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Fewer than two shifts
    Insufficient,
    PeriodicOscillation,
    Periodic,
    Oscillating,
    Irregular,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftPatternSummary {
    pub shift_count: usize,
    /// Mean gap between consecutive shifts in seconds
    pub mean_interval: Option<f64>,
    pub interval_std: Option<f64>,
    pub is_periodic: bool,
    pub is_oscillating: bool,
    pub sign_change_ratio: f64,
    pub dominant_direction: Option<DominantDirection>,
    pub most_common_type: Option<ShiftType>,
    pub pattern_type: PatternType,
}

impl ShiftPatternSummary {
    fn degenerate(events: &[&ShiftEvent]) -> Self {
        Self {
            shift_count: events.len(),
            mean_interval: None,
            interval_std: None,
            is_periodic: false,
            is_oscillating: false,
            sign_change_ratio: 0.0,
            dominant_direction: None,
            most_common_type: events.first().map(|e| e.shift_type),
            pattern_type: PatternType::Insufficient,
        }
    }
}

/// Summarize shifts, optionally only those inside `[from, to]`
pub fn analyze_shift_patterns(
    events: &[ShiftEvent],
    time_period: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> ShiftPatternSummary {
    let mut selected: Vec<&ShiftEvent> = events
        .iter()
        .filter(|e| time_period.is_none_or(|(from, to)| e.timestamp >= from && e.timestamp <= to))
        .collect();
    selected.sort_by_key(|e| e.timestamp);

    if selected.len() <= 1 {
        return ShiftPatternSummary::degenerate(&selected);
    }

    let intervals: Vec<f64> = selected
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_milliseconds() as f64 / 1000.0)
        .collect();
    let n = intervals.len() as f64;
    let mean = intervals.iter().sum::<f64>() / n;
    let std = (intervals.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n).sqrt();
    let is_periodic = mean > 0.0 && std < PERIODIC_SPREAD * mean;

    let flips = selected
        .windows(2)
        .filter(|w| w[0].direction_change * w[1].direction_change < 0.0)
        .count();
    let sign_change_ratio = flips as f64 / (selected.len() - 1) as f64;
    let is_oscillating = sign_change_ratio >= OSCILLATION_RATIO;

    let pattern_type = match (is_periodic, is_oscillating) {
        (true, true) => PatternType::PeriodicOscillation,
        (true, false) => PatternType::Periodic,
        (false, true) => PatternType::Oscillating,
        (false, false) => PatternType::Irregular,
    };

    ShiftPatternSummary {
        shift_count: selected.len(),
        mean_interval: Some(mean),
        interval_std: Some(std),
        is_periodic,
        is_oscillating,
        sign_change_ratio,
        dominant_direction: Some(dominant_direction(&selected)),
        most_common_type: most_common_type(&selected),
        pattern_type,
    }
}

fn dominant_direction(events: &[&ShiftEvent]) -> DominantDirection {
    let positive = events.iter().filter(|e| e.is_veer()).count();
    let negative = events.iter().filter(|e| e.direction_change < 0.0).count();
    if positive > DOMINANCE * negative {
        DominantDirection::Positive
    } else if negative > DOMINANCE * positive {
        DominantDirection::Negative
    } else {
        DominantDirection::Mixed
    }
}

fn most_common_type(events: &[&ShiftEvent]) -> Option<ShiftType> {
    let mut tally: Vec<(ShiftType, usize)> = Vec::new();
    for event in events {
        match tally.iter_mut().find(|(t, _)| *t == event.shift_type) {
            Some((_, count)) => *count += 1,
            None => tally.push((event.shift_type, 1)),
        }
    }
    let top = tally.iter().map(|(_, c)| *c).max()?;
    tally.into_iter().find(|(_, c)| *c == top).map(|(t, _)| t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn shift(offset_s: i64, change: f64, shift_type: ShiftType) -> ShiftEvent {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        ShiftEvent::new(t0 + Duration::seconds(offset_s), 180.0, 180.0 + change, 0.8, "statistical")
            .with_shift_type(shift_type)
    }

    #[test]
    fn test_degenerate_summary() {
        let summary = analyze_shift_patterns(&[], None);
        assert_eq!(summary.shift_count, 0);
        assert_eq!(summary.pattern_type, PatternType::Insufficient);

        let summary = analyze_shift_patterns(&[shift(0, 10.0, ShiftType::Trend)], None);
        assert_eq!(summary.shift_count, 1);
        assert_eq!(summary.most_common_type, Some(ShiftType::Trend));
        assert!(!summary.is_oscillating);
    }

    #[test]
    fn test_alternating_regular_shifts() {
        let events: Vec<ShiftEvent> = (0..6)
            .map(|i| shift(i * 30, if i % 2 == 0 { 12.0 } else { -12.0 }, ShiftType::Oscillation))
            .collect();
        let summary = analyze_shift_patterns(&events, None);
        assert!(summary.is_periodic);
        assert!(summary.is_oscillating);
        assert_eq!(summary.sign_change_ratio, 1.0);
        assert_eq!(summary.mean_interval, Some(30.0));
        assert_eq!(summary.dominant_direction, Some(DominantDirection::Mixed));
        assert_eq!(summary.pattern_type, PatternType::PeriodicOscillation);
    }

    #[test]
    fn test_dominant_veer_and_type_tie() {
        let events = vec![
            shift(600, 8.0, ShiftType::Phase),
            shift(0, 10.0, ShiftType::Persistent),
            shift(100, 15.0, ShiftType::Phase),
            shift(1000, 9.0, ShiftType::Persistent),
        ];
        let summary = analyze_shift_patterns(&events, None);
        assert_eq!(summary.dominant_direction, Some(DominantDirection::Positive));
        assert!(!summary.is_oscillating);
        assert!(!summary.is_periodic);
        assert_eq!(summary.pattern_type, PatternType::Irregular);
        // Two each; PERSISTENT appears first in time
        assert_eq!(summary.most_common_type, Some(ShiftType::Persistent));
    }

    #[test]
    fn test_time_period_filter() {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let events = vec![
            shift(0, 10.0, ShiftType::Phase),
            shift(100, -10.0, ShiftType::Phase),
            shift(200, 10.0, ShiftType::Phase),
        ];
        let summary = analyze_shift_patterns(&events, Some((t0 + Duration::seconds(50), t0 + Duration::seconds(300))));
        assert_eq!(summary.shift_count, 2);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["pattern_type"], "periodic_oscillation");
        assert_eq!(json["most_common_type"], "PHASE");
    }
}
