//! Synthetic Wind Data
//!
//! Deterministic generators for tests and benchmarks: a `Scenario` gives the
//! true wind at any elapsed time, `generate` samples it on a fixed clock and
//! adds seeded noise.

pub mod scenarios;

pub use scenarios::{GradualTrend, Oscillation, PersistentShift, Scenario, SteadyWind};

use crate::algo::angular::normalize_angle;
use crate::sample::WindRecord;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Measurement noise added on top of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NoiseModel {
    /// Uniform direction error in ±degrees
    pub direction_jitter: f64,
    /// Standard deviation of the speed error
    pub speed_sigma: f64,
}

impl NoiseModel {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn jitter(degrees: f64) -> Self {
        Self {
            direction_jitter: degrees.abs(),
            speed_sigma: 0.0,
        }
    }

    pub fn with_speed_sigma(mut self, sigma: f64) -> Self {
        self.speed_sigma = sigma;
        self
    }
}

/// Sample `count` wind records from a scenario every `interval`
pub fn generate(
    scenario: &dyn Scenario,
    start: DateTime<Utc>,
    interval: Duration,
    count: usize,
    noise: NoiseModel,
    seed: u64,
) -> Vec<WindRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let speed_noise = Normal::new(0.0, noise.speed_sigma)
        .ok()
        .filter(|_| noise.speed_sigma > 0.0);
    let step_ms = interval.num_milliseconds();

    (0..count)
        .map(|i| {
            let offset_ms = step_ms * i as i64;
            let elapsed = offset_ms as f64 / 1000.0;

            let mut direction = scenario.direction_at(elapsed);
            if noise.direction_jitter > 0.0 {
                direction += rng.random_range(-noise.direction_jitter..=noise.direction_jitter);
            }

            let mut record = WindRecord::new(
                start + Duration::milliseconds(offset_ms),
                normalize_angle(direction),
            );
            if let Some(speed) = scenario.speed_at(elapsed) {
                let error = speed_noise.map_or(0.0, |n| n.sample(&mut rng));
                record = record.with_speed((speed + error).max(0.0));
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generation_is_reproducible() {
        let start = Utc.timestamp_opt(0, 0).unwrap();
        let scenario = PersistentShift::new(180.0, 200.0, 50.0).with_speeds(10.0, 14.0);
        let noise = NoiseModel::jitter(2.0).with_speed_sigma(0.5);

        let a = generate(&scenario, start, Duration::seconds(5), 30, noise, 42);
        let b = generate(&scenario, start, Duration::seconds(5), 30, noise, 42);
        assert_eq!(a, b);

        let c = generate(&scenario, start, Duration::seconds(5), 30, noise, 43);
        assert_ne!(a, c);
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let start = Utc.timestamp_opt(0, 0).unwrap();
        let records = generate(&SteadyWind::new(0.0), start, Duration::seconds(1), 200, NoiseModel::jitter(3.0), 1);
        for r in &records {
            let d = r.direction.unwrap();
            assert!(d <= 3.0 || d >= 357.0, "direction {}", d);
        }
        assert_eq!(records[10].timestamp, start + Duration::seconds(10));
    }

    #[test]
    fn test_scenarios() {
        assert_eq!(PersistentShift::new(10.0, 30.0, 60.0).direction_at(59.9), 10.0);
        assert_eq!(PersistentShift::new(10.0, 30.0, 60.0).direction_at(60.0), 30.0);
        assert!((Oscillation::new(180.0, 10.0, 60.0).direction_at(15.0) - 190.0).abs() < 1e-9);
        assert!((GradualTrend::new(350.0, 1.0).direction_at(20.0) - 10.0).abs() < 1e-9);
        assert_eq!(SteadyWind::new(90.0).with_speed(8.0).speed_at(100.0), Some(8.0));
    }
}
