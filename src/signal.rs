//! Shift Events Emitted by the Detectors
//!
//! A `ShiftEvent` is the unit of output: one discrete change of wind
//! direction between a "before" and an "after" window, with the strategy
//! that found it, a raw confidence and (once the facade has scored it) a
//! context-aware significance used for ranking.

use crate::algo::angular::{angle_diff, normalize_angle};
use crate::sample::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Character of a detected shift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftType {
    /// Durable change to a new mean direction
    Persistent,
    /// Change of slope, the wind keeps rotating
    Trend,
    /// Short-period back-and-forth
    Oscillation,
    /// Moderate change that fits none of the above
    Phase,
    /// Not enough data to classify
    #[default]
    Unknown,
}

impl ShiftType {
    /// Weight used by the significance score
    pub fn weight(&self) -> f64 {
        match self {
            Self::Persistent => 1.0,
            Self::Trend => 0.9,
            Self::Phase => 0.7,
            Self::Oscillation => 0.5,
            Self::Unknown => 0.3,
        }
    }
}

/// Nearest course feature attached to an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    pub name: String,
    pub kind: String,
    pub distance_m: f64,
}

/// A detected wind shift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftEvent {
    pub timestamp: DateTime<Utc>,
    pub position: Option<Position>,
    pub before_direction: f64,
    pub after_direction: f64,
    /// Shortest signed arc `after - before`, in (-180, 180]
    pub direction_change: f64,
    pub confidence: f64,
    pub before_speed: Option<f64>,
    pub after_speed: Option<f64>,
    /// Strategy tag, `ensemble:<method>` for merged events
    pub detection_method: String,
    pub shift_type: ShiftType,
    /// Set by the facade once the event has been scored
    pub significance: Option<f64>,
    pub context: Option<EventContext>,
}

impl ShiftEvent {
    /// Create an event; the direction change is derived from the two directions
    pub fn new(
        timestamp: DateTime<Utc>,
        before_direction: f64,
        after_direction: f64,
        confidence: f64,
        detection_method: impl Into<String>,
    ) -> Self {
        let before = normalize_angle(before_direction);
        let after = normalize_angle(after_direction);
        Self {
            timestamp,
            position: None,
            before_direction: before,
            after_direction: after,
            direction_change: angle_diff(after, before),
            confidence: confidence.clamp(0.0, 1.0),
            before_speed: None,
            after_speed: None,
            detection_method: detection_method.into(),
            shift_type: ShiftType::Unknown,
            significance: None,
            context: None,
        }
    }

    pub fn with_speeds(mut self, before: Option<f64>, after: Option<f64>) -> Self {
        self.before_speed = before;
        self.after_speed = after;
        self
    }

    pub fn with_position(mut self, position: Option<Position>) -> Self {
        self.position = position;
        self
    }

    pub fn with_shift_type(mut self, shift_type: ShiftType) -> Self {
        self.shift_type = shift_type;
        self
    }

    /// Speed difference `after - before`, when both are known
    pub fn speed_change(&self) -> Option<f64> {
        match (self.before_speed, self.after_speed) {
            (Some(b), Some(a)) => Some(a - b),
            _ => None,
        }
    }

    /// Veer (clockwise) for positive changes, back for negative ones
    pub fn is_veer(&self) -> bool {
        self.direction_change > 0.0
    }
}
