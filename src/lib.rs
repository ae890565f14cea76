//! Wind shift detection engine.
//!
//! Turns a time-ordered stream of wind observations into a ranked list of
//! discrete shift events. Four strategies are available (statistical,
//! signal processing, heuristic features and an adaptive selector that may
//! run all three as an ensemble); the [`ShiftDetector`] facade owns the
//! configuration, result cache and significance ranking.

pub mod algo;
pub mod config;
pub mod engine;
pub mod enrich;
pub mod patterns;
pub mod sample;
pub mod scoring;
pub mod signal;
pub mod simulation;

pub use config::{ConfigError, DetectionMethod, DetectionParams, DetectorConfig, FeatureWeights};
pub use engine::{ShiftDetector, ShiftStrategy, Strategy};
pub use patterns::{DominantDirection, PatternType, ShiftPatternSummary, analyze_shift_patterns};
pub use sample::{ContextPoint, CourseContext, Position, TrackPoint, WindRecord, WindSample};
pub use scoring::evaluate_shift_significance;
pub use signal::{EventContext, ShiftEvent, ShiftType};
