pub mod wind;

pub use wind::{GradualTrend, Oscillation, PersistentShift, SteadyWind};

pub trait Scenario {
    /// True wind direction `elapsed_s` seconds into the run
    fn direction_at(&self, elapsed_s: f64) -> f64;
    fn speed_at(&self, _elapsed_s: f64) -> Option<f64> {
        None
    }
}
