use crate::algo::angular::normalize_angle;
use crate::simulation::scenarios::Scenario;
use std::f64::consts::PI;

// --- 1. Steady wind, nothing to detect ---
pub struct SteadyWind {
    pub direction: f64,
    pub speed: Option<f64>,
}

impl SteadyWind {
    pub fn new(direction: f64) -> Self {
        Self {
            direction,
            speed: None,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }
}

impl Scenario for SteadyWind {
    fn direction_at(&self, _elapsed_s: f64) -> f64 {
        normalize_angle(self.direction)
    }

    fn speed_at(&self, _elapsed_s: f64) -> Option<f64> {
        self.speed
    }
}

// --- 2. One durable step to a new direction ---
pub struct PersistentShift {
    pub before: f64,
    pub after: f64,
    pub shift_at_s: f64,
    pub speed_before: Option<f64>,
    pub speed_after: Option<f64>,
}

impl PersistentShift {
    pub fn new(before: f64, after: f64, shift_at_s: f64) -> Self {
        Self {
            before,
            after,
            shift_at_s,
            speed_before: None,
            speed_after: None,
        }
    }

    pub fn with_speeds(mut self, before: f64, after: f64) -> Self {
        self.speed_before = Some(before);
        self.speed_after = Some(after);
        self
    }
}

impl Scenario for PersistentShift {
    fn direction_at(&self, elapsed_s: f64) -> f64 {
        if elapsed_s < self.shift_at_s {
            normalize_angle(self.before)
        } else {
            normalize_angle(self.after)
        }
    }

    fn speed_at(&self, elapsed_s: f64) -> Option<f64> {
        if elapsed_s < self.shift_at_s {
            self.speed_before
        } else {
            self.speed_after
        }
    }
}

// --- 3. Sinusoidal swing around a mean ---
pub struct Oscillation {
    pub mean: f64,
    pub amplitude: f64,
    pub period_s: f64,
}

impl Oscillation {
    pub fn new(mean: f64, amplitude: f64, period_s: f64) -> Self {
        Self {
            mean,
            amplitude,
            period_s,
        }
    }
}

impl Scenario for Oscillation {
    fn direction_at(&self, elapsed_s: f64) -> f64 {
        if self.period_s <= 0.0 {
            return normalize_angle(self.mean);
        }
        normalize_angle(self.mean + self.amplitude * (2.0 * PI * elapsed_s / self.period_s).sin())
    }
}

// --- 4. Steady rotation (veer for positive rates) ---
pub struct GradualTrend {
    pub start: f64,
    /// Degrees per second
    pub rate: f64,
}

impl GradualTrend {
    pub fn new(start: f64, rate: f64) -> Self {
        Self { start, rate }
    }
}

impl Scenario for GradualTrend {
    fn direction_at(&self, elapsed_s: f64) -> f64 {
        normalize_angle(self.start + self.rate * elapsed_s)
    }
}
