use crate::algo::{
    adaptive::AdaptiveDetector,
    heuristic::HeuristicDetector,
    spectral::SignalProcessingDetector,
    statistical::StatisticalDetector,
};
use crate::config::{
    ConfigError, DEFAULT_SENSITIVITY, DetectionMethod, DetectionParams, DetectorConfig,
    clamp_sensitivity, derived_window_size,
};
use crate::enrich::{attach_course_context, join_track_positions};
use crate::patterns::{ShiftPatternSummary, analyze_shift_patterns};
use crate::sample::{CourseContext, TrackPoint, WindRecord, WindSample, normalize_records};
use crate::scoring::evaluate_shift_significance;
use crate::signal::ShiftEvent;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

// --- Core Abstractions ---

/// The interface every detection strategy implements
pub trait ShiftStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    /// Below this many samples `detect` returns nothing
    fn min_samples(&self) -> usize;
    /// Detect shifts in a batch of samples; the input is never modified
    fn detect(&self, samples: &[WindSample]) -> Vec<ShiftEvent>;
}

/// Closed set of strategies (static dispatch)
pub enum Strategy {
    Statistical(StatisticalDetector),
    SignalProcessing(SignalProcessingDetector),
    MachineLearning(HeuristicDetector),
    Adaptive(AdaptiveDetector),
}

impl Strategy {
    pub fn for_method(method: DetectionMethod, config: &DetectorConfig) -> Self {
        match method {
            DetectionMethod::Statistical => Self::Statistical(StatisticalDetector::new(config.clone())),
            DetectionMethod::SignalProcessing => {
                Self::SignalProcessing(SignalProcessingDetector::new(config.clone()))
            }
            DetectionMethod::MachineLearning => Self::MachineLearning(HeuristicDetector::new(config.clone())),
            DetectionMethod::Adaptive => Self::Adaptive(AdaptiveDetector::new(config.clone())),
        }
    }

    fn inner(&self) -> &dyn ShiftStrategy {
        match self {
            Self::Statistical(d) => d,
            Self::SignalProcessing(d) => d,
            Self::MachineLearning(d) => d,
            Self::Adaptive(d) => d,
        }
    }
}

impl ShiftStrategy for Strategy {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn min_samples(&self) -> usize {
        self.inner().min_samples()
    }

    fn detect(&self, samples: &[WindSample]) -> Vec<ShiftEvent> {
        self.inner().detect(samples)
    }
}

// --- Facade ---

/// Everything a detection call reads, swapped as one unit on reconfiguration
struct ActiveProfile {
    method: DetectionMethod,
    sensitivity: f64,
    /// Window pinned by the caller; otherwise derived from the sensitivity
    window_override: Option<f64>,
    config: DetectorConfig,
    strategy: Strategy,
}

impl ActiveProfile {
    fn new(method: DetectionMethod, sensitivity: f64) -> Self {
        let sensitivity = clamp_sensitivity(sensitivity);
        let config = DetectorConfig::from_sensitivity(sensitivity);
        Self {
            method,
            sensitivity,
            window_override: None,
            strategy: Strategy::for_method(method, &config),
            config,
        }
    }
}

/// Shift detection facade.
///
/// Owns the configuration, the active strategy and a result cache keyed by
/// a fingerprint of the input. All methods take `&self`; configuration is
/// copy-on-write so in-flight detections keep the profile they started with.
pub struct ShiftDetector {
    active: RwLock<Arc<ActiveProfile>>,
    cache: RwLock<HashMap<u64, Arc<Vec<ShiftEvent>>>>,
}

impl ShiftDetector {
    /// Build a detector from a method name; unknown names are rejected
    pub fn new(method: &str, sensitivity: f64) -> Result<Self, ConfigError> {
        let method = method.parse::<DetectionMethod>().inspect_err(|e| {
            warn!(error = %e, "Rejected detection method");
        })?;
        Ok(Self::with_method(method, sensitivity))
    }

    pub fn with_method(method: DetectionMethod, sensitivity: f64) -> Self {
        Self {
            active: RwLock::new(Arc::new(ActiveProfile::new(method, sensitivity))),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn profile(&self) -> Arc<ActiveProfile> {
        Arc::clone(&self.active.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn method(&self) -> DetectionMethod {
        self.profile().method
    }

    pub fn sensitivity(&self) -> f64 {
        self.profile().sensitivity
    }

    pub fn config(&self) -> DetectorConfig {
        self.profile().config.clone()
    }

    /// Number of cached results
    pub fn cached_results(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear_cache(&self) {
        self.cache.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Apply a partial configuration update.
    ///
    /// A new sensitivity re-derives the angle and confidence thresholds
    /// before any explicit threshold in the same update is applied. The
    /// strategy is rebuilt and the cache cleared on every successful call.
    pub fn set_detection_params(&self, params: DetectionParams) -> Result<(), ConfigError> {
        params.validate()?;
        let current = self.profile();

        let method = match params.method.as_deref() {
            Some(name) => name.parse::<DetectionMethod>().inspect_err(|e| {
                warn!(error = %e, "Rejected detection method");
            })?,
            None => current.method,
        };

        let mut sensitivity = current.sensitivity;
        let mut config = current.config.clone();
        if let Some(s) = params.sensitivity {
            sensitivity = clamp_sensitivity(s);
            config.apply_sensitivity(sensitivity);
        }
        let window_override = params.window_size.map(|w| w.max(1.0)).or(current.window_override);
        config.window_size = Some(window_override.unwrap_or_else(|| derived_window_size(sensitivity)));

        if let Some(v) = params.min_shift_angle {
            config.min_shift_angle = v.max(0.0);
        }
        if let Some(v) = params.confidence_threshold {
            config.confidence_threshold = v.clamp(0.0, 1.0);
        }
        if let Some(v) = params.peak_prominence {
            config.peak_prominence = v.max(0.0);
        }
        if let Some(v) = params.peak_width {
            config.peak_width = v.max(0.0);
        }
        if let Some(weights) = params.feature_weights {
            config.feature_weights = weights;
        }
        if let Some(enabled) = params.use_course_context {
            config.use_course_context = enabled;
        }

        let profile = ActiveProfile {
            method,
            sensitivity,
            window_override,
            strategy: Strategy::for_method(method, &config),
            config,
        };
        info!(
            method = %profile.method,
            sensitivity = profile.sensitivity,
            min_shift_angle = profile.config.min_shift_angle,
            confidence_threshold = profile.config.confidence_threshold,
            window_size = ?profile.config.window_size,
            "Detection parameters updated"
        );

        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(profile);
        self.clear_cache();
        Ok(())
    }

    /// Detect, score and rank shifts in a batch of wind records.
    ///
    /// Returns the cached result when the method, record count and time span
    /// match a previous call.
    pub fn detect_shifts(
        &self,
        wind: &[WindRecord],
        track: Option<&[TrackPoint]>,
        course: Option<&CourseContext>,
    ) -> Arc<Vec<ShiftEvent>> {
        let profile = self.profile();
        let key = fingerprint(profile.method, wind);

        if let Some(hit) = self.cache.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            debug!(fingerprint = key, "Shift cache hit");
            return Arc::clone(hit);
        }
        debug!(fingerprint = key, records = wind.len(), "Shift cache miss");

        if wind.is_empty() {
            return Arc::new(Vec::new());
        }
        let (mut samples, dropped) = normalize_records(wind);
        if samples.is_empty() {
            warn!(records = wind.len(), "No wind record carries a direction, nothing to detect");
            return Arc::new(Vec::new());
        }
        if dropped > 0 {
            debug!(dropped, "Dropped wind records without a usable direction");
        }

        if let Some(track) = track.filter(|t| !t.is_empty()) {
            samples = join_track_positions(&samples, track, profile.config.track_join_tolerance);
        }

        let mut events = profile.strategy.detect(&samples);

        let course = course.filter(|c| profile.config.use_course_context && !c.is_empty());
        if let Some(course) = course {
            attach_course_context(&mut events, course, profile.config.context_radius);
        }
        for event in events.iter_mut() {
            event.significance = Some(evaluate_shift_significance(
                event,
                course,
                profile.config.context_radius,
            ));
        }
        events.sort_by(|a, b| {
            b.significance
                .partial_cmp(&a.significance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.timestamp.cmp(&b.timestamp))
        });

        debug!(
            strategy = profile.strategy.name(),
            samples = samples.len(),
            events = events.len(),
            "Shift detection finished"
        );

        let result = Arc::new(events);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // A reconfiguration during this call has already cleared the cache; keep it clean
        if Arc::ptr_eq(&profile, &self.profile()) {
            cache.insert(key, Arc::clone(&result));
        }
        result
    }

    /// Significance of one event under the current context radius
    pub fn evaluate_shift_significance(&self, event: &ShiftEvent, context: Option<&CourseContext>) -> f64 {
        evaluate_shift_significance(event, context, self.profile().config.context_radius)
    }

    pub fn analyze_shift_patterns(
        &self,
        events: &[ShiftEvent],
        time_period: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> ShiftPatternSummary {
        analyze_shift_patterns(events, time_period)
    }
}

impl Default for ShiftDetector {
    fn default() -> Self {
        Self::with_method(DetectionMethod::Adaptive, DEFAULT_SENSITIVITY)
    }
}

/// Cache key: method, record count and the min/max timestamp.
///
/// Distinct datasets with equal size and time span share a key.
fn fingerprint(method: DetectionMethod, records: &[WindRecord]) -> u64 {
    let mut buf = Vec::with_capacity(48);
    buf.extend_from_slice(method.name().as_bytes());
    buf.push(0);
    buf.extend_from_slice(&(records.len() as u64).to_le_bytes());

    let min = records.iter().map(|r| r.timestamp).min();
    let max = records.iter().map(|r| r.timestamp).max();
    if let (Some(min), Some(max)) = (min, max) {
        buf.extend_from_slice(&min.timestamp_micros().to_le_bytes());
        buf.extend_from_slice(&max.timestamp_micros().to_le_bytes());
    }
    xxh3_64(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{NoiseModel, PersistentShift, generate};
    use chrono::{Duration, TimeZone};

    fn step_records() -> Vec<WindRecord> {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let scenario = PersistentShift::new(180.0, 200.0, 1000.0);
        generate(&scenario, start, Duration::seconds(10), 200, NoiseModel::jitter(1.0), 17)
    }

    #[test]
    fn test_strategy_dispatch() {
        let config = DetectorConfig::default();
        for (method, name, min) in [
            (DetectionMethod::Statistical, "statistical", 10),
            (DetectionMethod::SignalProcessing, "signal_processing", 20),
            (DetectionMethod::MachineLearning, "machine_learning", 15),
            (DetectionMethod::Adaptive, "adaptive", 10),
        ] {
            let strategy = Strategy::for_method(method, &config);
            assert_eq!(strategy.name(), name);
            assert_eq!(strategy.min_samples(), min);
        }
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        assert!(matches!(
            ShiftDetector::new("bogus", 0.5),
            Err(ConfigError::UnknownMethod(_))
        ));
        let detector = ShiftDetector::new("statistical", 0.5).unwrap();
        let err = detector.set_detection_params(DetectionParams::default().method("fourier"));
        assert!(err.is_err());
        assert_eq!(detector.method(), DetectionMethod::Statistical);
    }

    #[test]
    fn test_fingerprint_includes_method() {
        let records = step_records();
        let a = fingerprint(DetectionMethod::Statistical, &records);
        let b = fingerprint(DetectionMethod::Adaptive, &records);
        assert_ne!(a, b);
        assert_eq!(a, fingerprint(DetectionMethod::Statistical, &records));
        assert_ne!(a, fingerprint(DetectionMethod::Statistical, &records[1..]));
    }

    #[test]
    fn test_params_rederive_thresholds() {
        let detector = ShiftDetector::with_method(DetectionMethod::Statistical, 0.5);
        assert_eq!(detector.config().window_size, Some(180.0));

        detector
            .set_detection_params(DetectionParams::default().sensitivity(1.0))
            .unwrap();
        let config = detector.config();
        assert!((config.min_shift_angle - 3.0).abs() < 1e-9);
        assert_eq!(config.window_size, Some(60.0));

        detector
            .set_detection_params(DetectionParams::default().window_size(240.0).min_shift_angle(4.0))
            .unwrap();
        detector
            .set_detection_params(DetectionParams::default().sensitivity(0.2))
            .unwrap();
        let config = detector.config();
        assert_eq!(config.window_size, Some(240.0), "pinned window survives");
        assert!((config.min_shift_angle - 8.6).abs() < 1e-9, "sensitivity re-derives the angle");
    }

    #[test]
    fn test_results_are_ranked_by_significance() {
        let detector = ShiftDetector::with_method(DetectionMethod::Statistical, 1.0);
        let events = detector.detect_shifts(&step_records(), None, None);
        assert!(!events.is_empty());
        for pair in events.windows(2) {
            assert!(pair[0].significance >= pair[1].significance);
        }
        assert!(events.iter().all(|e| e.significance.is_some()));
    }

    #[test]
    fn test_cache_is_not_filled_by_empty_input() {
        let detector = ShiftDetector::default();
        let records = vec![WindRecord {
            timestamp: Utc.timestamp_opt(0, 0).unwrap(),
            speed: Some(5.0),
            ..Default::default()
        }];
        assert!(detector.detect_shifts(&records, None, None).is_empty());
        assert_eq!(detector.cached_results(), 0);
    }
}
