//! Signal-Processing Shift Detector
//!
//! The direction is split into its sine/cosine components, each smoothed
//! with a Savitzky-Golay filter and recombined. Shifts show up as peaks of
//! the absolute rate of change of the smoothed direction.
//!
//! Rates are expressed in degrees per nominal sampling interval (the median
//! gap), so the prominence threshold does not depend on the logging rate.
//!
//! Each candidate compares the `context_window` before it with the one after
//! it. The before window never reaches back past the previous accepted shift,
//! so every event measures the regime since the last change.

use crate::algo::angular::{angle_diff, circular_smooth, normalize_angle};
use crate::algo::filters::{
    enforce_distance, find_peaks, harmonic_amplitudes, moving_average, savgol_filter,
};
use crate::algo::series::{WindSeries, WindowSide};
use crate::config::DetectorConfig;
use crate::engine::ShiftStrategy;
use crate::sample::WindSample;
use crate::signal::{ShiftEvent, ShiftType};
use tracing::debug;

const MIN_SIDE_SAMPLES: usize = 3;
/// Growth in one harmonic band must exceed the other band by this factor
const BAND_DOMINANCE: f64 = 2.0;

/// A peak that passed the window and threshold checks
struct Candidate {
    index: usize,
    before: WindowSide,
    after: WindowSide,
    change: f64,
    confidence: f64,
}

pub struct SignalProcessingDetector {
    config: DetectorConfig,
}

impl SignalProcessingDetector {
    pub const MIN_SAMPLES: usize = 20;

    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Smooth the direction through its sine/cosine components
    pub fn smooth_directions(&self, directions: &[f64]) -> Vec<f64> {
        let (sines, cosines): (Vec<f64>, Vec<f64>) = directions
            .iter()
            .map(|d| {
                let r = d.to_radians();
                (r.sin(), r.cos())
            })
            .unzip();

        let window = self.config.savgol_window;
        let order = self.config.savgol_order;
        match (
            savgol_filter(&sines, window, order),
            savgol_filter(&cosines, window, order),
        ) {
            (Some(s), Some(c)) => s
                .iter()
                .zip(&c)
                .map(|(s, c)| normalize_angle(s.atan2(*c).to_degrees()))
                .collect(),
            _ => {
                debug!(samples = directions.len(), "Savitzky-Golay window too small, using circular smoothing");
                circular_smooth(directions, self.config.smoothing_window)
            }
        }
    }

    /// Absolute smoothed rate of change, degrees per nominal interval
    fn absolute_rate(&self, series: &WindSeries, smoothed: &[f64]) -> Option<Vec<f64>> {
        let nominal = series.median_interval()?;
        let times = series.times();

        let mut rate = vec![0.0; smoothed.len()];
        for i in 1..smoothed.len() {
            let dt = times[i] - times[i - 1];
            if dt > 0.0 {
                rate[i] = angle_diff(smoothed[i], smoothed[i - 1]) / (dt / nominal);
            }
        }

        Some(
            moving_average(&rate, self.config.rate_smoothing)
                .into_iter()
                .map(f64::abs)
                .collect(),
        )
    }

    fn candidates(&self, series: &WindSeries, rate: &[f64]) -> Vec<Candidate> {
        let n = series.len();
        let peaks = enforce_distance(
            find_peaks(rate, self.config.peak_prominence, self.config.peak_width),
            self.config.rate_smoothing,
        );
        let window = self.config.context_window;
        let mut accepted: Vec<Candidate> = Vec::new();

        for peak in &peaks {
            let i = peak.index;
            if i == 0 || i + 1 >= n {
                continue;
            }
            let floor = accepted.last().map_or(0, |c| c.index);
            let before = series.before(i, window);
            let before = before.start.max(floor)..before.end;
            let after = series.after(i, window);
            if before.len() < MIN_SIDE_SAMPLES || after.len() < MIN_SIDE_SAMPLES {
                continue;
            }
            let (Some(before), Some(after)) = (series.side(before), series.side(after)) else {
                continue;
            };

            let change = angle_diff(after.direction.mean, before.direction.mean);
            let confidence = (peak.prominence / 2.0).min(1.0);
            if !self.config.accepts(change, confidence) {
                continue;
            }

            accepted.push(Candidate {
                index: i,
                before,
                after,
                change,
                confidence,
            });
        }
        accepted
    }

    /// Compare low and high harmonic content of the two windows
    fn spectral_type(
        &self,
        series: &WindSeries,
        before: &WindowSide,
        after: &WindowSide,
    ) -> Option<ShiftType> {
        let harmonics = self.config.spectral_harmonics;
        if harmonics < 2 {
            return None;
        }
        let spectrum = |side: &WindowSide| {
            harmonic_amplitudes(
                &series.residuals(side.range.clone(), side.direction.mean),
                harmonics,
            )
        };
        let before = spectrum(before);
        let after = spectrum(after);

        let split = harmonics / 2;
        let band = |amps: &[f64], range: std::ops::Range<usize>| amps[range].iter().sum::<f64>();
        let low = band(&after, 0..split) - band(&before, 0..split);
        let high = band(&after, split..harmonics) - band(&before, split..harmonics);
        let floor = self.config.spectral_growth_floor;

        if low > floor && low > BAND_DOMINANCE * high.max(0.0) {
            Some(ShiftType::Persistent)
        } else if high > floor && high > BAND_DOMINANCE * low.max(0.0) {
            Some(ShiftType::Oscillation)
        } else {
            None
        }
    }

    fn magnitude_type(change: f64) -> ShiftType {
        let magnitude = change.abs();
        if magnitude > 15.0 {
            ShiftType::Persistent
        } else if magnitude > 8.0 {
            ShiftType::Phase
        } else {
            ShiftType::Oscillation
        }
    }
}

impl ShiftStrategy for SignalProcessingDetector {
    fn name(&self) -> &'static str {
        "signal_processing"
    }

    fn min_samples(&self) -> usize {
        Self::MIN_SAMPLES
    }

    fn detect(&self, samples: &[WindSample]) -> Vec<ShiftEvent> {
        if samples.len() < Self::MIN_SAMPLES {
            debug!(samples = samples.len(), "Too few samples for signal-processing detection");
            return Vec::new();
        }
        let series = WindSeries::new(samples);
        let smoothed = self.smooth_directions(series.directions());
        let Some(rate) = self.absolute_rate(&series, &smoothed) else {
            debug!("All samples share one timestamp, no rate of change");
            return Vec::new();
        };

        let candidates = self.candidates(&series, &rate);
        let events: Vec<ShiftEvent> = candidates
            .iter()
            .map(|c| {
                let shift_type = self
                    .spectral_type(&series, &c.before, &c.after)
                    .unwrap_or_else(|| {
                        debug!(index = c.index, "Spectra inconclusive, classifying by magnitude");
                        Self::magnitude_type(c.change)
                    });
                series
                    .event_at(c.index, &c.before, &c.after, c.confidence, self.name())
                    .with_shift_type(shift_type)
            })
            .collect();

        debug!(emitted = events.len(), "Signal-processing detection finished");
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::normalize_records;
    use crate::simulation::{NoiseModel, Oscillation, PersistentShift, SteadyWind, generate};
    use chrono::{Duration, TimeZone, Utc};
    use std::f64::consts::PI;

    #[test]
    fn test_smoothing_handles_north_crossing() {
        let detector = SignalProcessingDetector::new(DetectorConfig::default());
        let dirs: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 358.0 } else { 2.0 }).collect();
        let smoothed = detector.smooth_directions(&dirs);
        assert!(smoothed.iter().all(|d| angle_diff(*d, 0.0).abs() < 2.5));
    }

    #[test]
    fn test_persistent_step_is_one_event() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let scenario = PersistentShift::new(180.0, 200.0, 1000.0);
        let records = generate(&scenario, start, Duration::seconds(10), 200, NoiseModel::jitter(1.0), 21);
        let (samples, _) = normalize_records(&records);

        let detector = SignalProcessingDetector::new(DetectorConfig::from_sensitivity(0.5));
        let events = detector.detect(&samples);

        assert_eq!(events.len(), 1, "expected one event, got {:?}", events);
        let event = &events[0];
        assert!((event.direction_change - 20.0).abs() < 2.5, "change {}", event.direction_change);
        assert!(event.confidence > 0.8);
        assert_eq!(event.shift_type, ShiftType::Persistent);
        let offset = (event.timestamp - (start + Duration::seconds(1000))).num_seconds();
        assert!(offset.abs() <= 30, "event {}s from the step", offset);
    }

    #[test]
    fn test_oscillation_is_typed_oscillation() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let scenario = Oscillation::new(180.0, 10.0, 60.0);
        let records = generate(&scenario, start, Duration::seconds(5), 240, NoiseModel::none(), 0);
        let (samples, _) = normalize_records(&records);

        let config = DetectorConfig::from_sensitivity(1.0);
        let events = SignalProcessingDetector::new(config.clone()).detect(&samples);

        let oscillations = events.iter().filter(|e| e.shift_type == ShiftType::Oscillation).count();
        assert!(
            oscillations * 2 > events.len(),
            "oscillation should dominate {:?}",
            events.iter().map(|e| e.shift_type).collect::<Vec<_>>()
        );
        for pair in events.windows(2) {
            assert!(pair[0].direction_change * pair[1].direction_change < 0.0, "swings alternate");
        }
        for event in &events {
            assert!(event.direction_change.abs() >= config.min_shift_angle);
            assert!(event.confidence >= config.confidence_threshold);
        }
    }

    fn series_of(directions: impl IntoIterator<Item = f64>) -> WindSeries {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let samples: Vec<WindSample> = directions
            .into_iter()
            .enumerate()
            .map(|(i, d)| WindSample::new(start + Duration::seconds(5 * i as i64), d))
            .collect();
        WindSeries::new(&samples)
    }

    #[test]
    fn test_spectral_type_branches() {
        let detector = SignalProcessingDetector::new(DetectorConfig::default());
        let sides = |series: &WindSeries, split: usize, end: usize| {
            (series.side(0..split).unwrap(), series.side(split..end).unwrap())
        };

        // Half a swing before, three full 60 s cycles after
        let series = series_of((0..42).map(|i| 180.0 + 10.0 * (2.0 * PI * i as f64 / 12.0).sin()));
        let (before, after) = sides(&series, 6, 42);
        assert_eq!(detector.spectral_type(&series, &before, &after), Some(ShiftType::Oscillation));

        // Calm, then one slow swing across the whole after window
        let series = series_of(
            (0..72).map(|i| if i < 36 { 180.0 } else { 200.0 + 8.0 * (2.0 * PI * (i - 36) as f64 / 36.0).sin() }),
        );
        let (before, after) = sides(&series, 36, 72);
        assert_eq!(detector.spectral_type(&series, &before, &after), Some(ShiftType::Persistent));

        // A clean step leaves both spectra flat
        let series = series_of((0..72).map(|i| if i < 36 { 180.0 } else { 200.0 }));
        let (before, after) = sides(&series, 36, 72);
        assert_eq!(detector.spectral_type(&series, &before, &after), None);
    }

    #[test]
    fn test_constant_and_sparse_inputs() {
        let start = Utc.timestamp_opt(0, 0).unwrap();
        let detector = SignalProcessingDetector::new(DetectorConfig::from_sensitivity(1.0));

        let records = generate(&SteadyWind::new(42.0), start, Duration::seconds(2), 500, NoiseModel::none(), 0);
        assert!(detector.detect(&normalize_records(&records).0).is_empty());

        let records = generate(&SteadyWind::new(42.0), start, Duration::seconds(2), 19, NoiseModel::none(), 0);
        assert!(detector.detect(&normalize_records(&records).0).is_empty());
    }

    #[test]
    fn test_magnitude_fallback() {
        assert_eq!(SignalProcessingDetector::magnitude_type(-20.0), ShiftType::Persistent);
        assert_eq!(SignalProcessingDetector::magnitude_type(9.0), ShiftType::Phase);
        assert_eq!(SignalProcessingDetector::magnitude_type(6.0), ShiftType::Oscillation);
    }
}
