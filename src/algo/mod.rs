pub mod adaptive;
pub mod angular;
pub mod filters;
pub mod heuristic;
pub mod series;
pub mod spectral;
pub mod statistical;

// Re-exports for convenience
pub use adaptive::{AdaptiveDetector, DataCharacteristics, Selection, merge_events};
pub use angular::{CircularStats, angle_diff, circular_mean, circular_std};
pub use heuristic::{FeatureFrame, HeuristicDetector, ShiftFeatures};
pub use series::WindSeries;
pub use spectral::SignalProcessingDetector;
pub use statistical::StatisticalDetector;
