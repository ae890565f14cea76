//! Detection Configuration
//!
//! All tunables of the shift detectors live in one typed `DetectorConfig`.
//! Most callers only pick a sensitivity; the thresholds are derived from it.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const MIN_SENSITIVITY: f64 = 0.1;
pub const MAX_SENSITIVITY: f64 = 1.0;
pub const DEFAULT_SENSITIVITY: f64 = 0.5;

/// Detection strategy selected on the facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Statistical,
    SignalProcessing,
    /// Fixed-weight feature scoring (the name is historical, nothing is trained)
    MachineLearning,
    #[default]
    Adaptive,
}

impl DetectionMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Statistical => "statistical",
            Self::SignalProcessing => "signal_processing",
            Self::MachineLearning => "machine_learning",
            Self::Adaptive => "adaptive",
        }
    }
}

impl FromStr for DetectionMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "statistical" => Ok(Self::Statistical),
            "signal_processing" => Ok(Self::SignalProcessing),
            "machine_learning" => Ok(Self::MachineLearning),
            "adaptive" => Ok(Self::Adaptive),
            _ => Err(ConfigError::UnknownMethod(s.to_string())),
        }
    }
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Linear weights of the heuristic feature score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    pub trend_change: f64,
    pub dir_change_short: f64,
    pub dir_change_long: f64,
    pub dir_std_short: f64,
    pub dir_std_long: f64,
    pub speed_change: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            trend_change: 0.4,
            dir_change_short: 0.3,
            dir_change_long: 0.2,
            dir_std_short: -0.2,
            dir_std_long: -0.1,
            speed_change: 0.1,
        }
    }
}

/// Tunables shared by all detection strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Smallest |direction change| ever emitted (degrees)
    pub min_shift_angle: f64,
    /// Smallest confidence ever emitted (0..1)
    pub confidence_threshold: f64,
    /// Statistical before/after window in seconds, 300 s when unset
    pub window_size: Option<f64>,
    /// Centered circular smoothing window (samples)
    pub smoothing_window: usize,
    /// Before/after window of the spectral and heuristic detectors (seconds)
    pub context_window: f64,
    pub savgol_window: usize,
    pub savgol_order: usize,
    /// Moving average applied to the rate of change (samples)
    pub rate_smoothing: usize,
    /// Minimum peak prominence, degrees per nominal sampling interval
    pub peak_prominence: f64,
    /// Minimum peak width at half prominence (samples)
    pub peak_width: f64,
    pub spectral_harmonics: usize,
    /// Harmonic amplitude growth (degrees) below which spectra count as unchanged
    pub spectral_growth_floor: f64,
    pub feature_weights: FeatureWeights,
    /// Candidates closer than this (seconds) describe the same shift
    pub merge_window: f64,
    /// Maximum time gap for joining a track position (seconds)
    pub track_join_tolerance: f64,
    /// Radius for attaching course context (meters)
    pub context_radius: f64,
    pub use_course_context: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_shift_angle: 5.0,
            confidence_threshold: 0.6,
            window_size: None,
            smoothing_window: 5,
            context_window: 180.0,
            savgol_window: 15,
            savgol_order: 3,
            rate_smoothing: 3,
            peak_prominence: 0.2,
            peak_width: 2.0,
            spectral_harmonics: 4,
            spectral_growth_floor: 1.0,
            feature_weights: FeatureWeights::default(),
            merge_window: 60.0,
            track_join_tolerance: 300.0,
            context_radius: 500.0,
            use_course_context: true,
        }
    }
}

impl DetectorConfig {
    /// Derive thresholds from a single sensitivity scalar in [0.1, 1.0]
    pub fn from_sensitivity(sensitivity: f64) -> Self {
        let mut config = Self::default();
        config.apply_sensitivity(sensitivity);
        config.window_size = Some(derived_window_size(clamp_sensitivity(sensitivity)));
        config
    }

    /// Re-derive the angle and confidence thresholds; the window is left alone
    pub fn apply_sensitivity(&mut self, sensitivity: f64) {
        let s = clamp_sensitivity(sensitivity);
        self.min_shift_angle = (10.0 - s * 7.0).max(3.0);
        self.confidence_threshold = (0.9 - s * 0.3).max(0.4);
    }

    /// Statistical analysis window in seconds
    pub fn statistical_window(&self) -> f64 {
        self.window_size.unwrap_or(300.0)
    }

    /// Whether an event clears both emission thresholds
    pub fn accepts(&self, direction_change: f64, confidence: f64) -> bool {
        direction_change.abs() >= self.min_shift_angle && confidence >= self.confidence_threshold
    }
}

pub fn clamp_sensitivity(sensitivity: f64) -> f64 {
    if sensitivity.is_finite() {
        sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY)
    } else {
        DEFAULT_SENSITIVITY
    }
}

/// Window in seconds used when the caller has not pinned one
pub fn derived_window_size(sensitivity: f64) -> f64 {
    (300.0 - clamp_sensitivity(sensitivity) * 240.0).round()
}

/// Partial update of the facade configuration; unset fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    pub method: Option<String>,
    pub sensitivity: Option<f64>,
    pub min_shift_angle: Option<f64>,
    pub confidence_threshold: Option<f64>,
    pub window_size: Option<f64>,
    pub peak_prominence: Option<f64>,
    pub peak_width: Option<f64>,
    pub feature_weights: Option<FeatureWeights>,
    pub use_course_context: Option<bool>,
}

impl DetectionParams {
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = Some(sensitivity);
        self
    }

    pub fn min_shift_angle(mut self, degrees: f64) -> Self {
        self.min_shift_angle = Some(degrees);
        self
    }

    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    pub fn window_size(mut self, seconds: f64) -> Self {
        self.window_size = Some(seconds);
        self
    }

    pub fn peak_prominence(mut self, prominence: f64) -> Self {
        self.peak_prominence = Some(prominence);
        self
    }

    pub fn peak_width(mut self, width: f64) -> Self {
        self.peak_width = Some(width);
        self
    }

    pub fn feature_weights(mut self, weights: FeatureWeights) -> Self {
        self.feature_weights = Some(weights);
        self
    }

    pub fn use_course_context(mut self, enabled: bool) -> Self {
        self.use_course_context = Some(enabled);
        self
    }

    /// Reject non-finite numeric values before anything is applied
    pub fn validate(&self) -> Result<(), ConfigError> {
        let numeric = [
            ("sensitivity", self.sensitivity),
            ("min_shift_angle", self.min_shift_angle),
            ("confidence_threshold", self.confidence_threshold),
            ("window_size", self.window_size),
            ("peak_prominence", self.peak_prominence),
            ("peak_width", self.peak_width),
        ];
        for (name, value) in numeric {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(ConfigError::InvalidParameter { name, value: v });
                }
            }
        }
        Ok(())
    }
}

/// Errors raised by configuration calls
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    UnknownMethod(String),
    InvalidParameter { name: &'static str, value: f64 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMethod(m) => write!(
                f,
                "Unknown detection method: {} (expected statistical, signal_processing, machine_learning or adaptive)",
                m
            ),
            Self::InvalidParameter { name, value } => {
                write!(f, "Invalid value for {}: {}", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
