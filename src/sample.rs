//! Wind Observations and Navigation Context
//!
//! Input-side types consumed by the shift detectors. Callers hand in raw
//! `WindRecord` rows; the engine normalizes them into `WindSample`s before
//! any strategy runs. Track and course data are optional enrichment inputs.

use crate::algo::angular::normalize_angle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build a position only when both coordinates are usable
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(Self::new(lat, lon))
            }
            _ => None,
        }
    }
}

/// One normalized wind observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindSample {
    pub timestamp: DateTime<Utc>,
    /// Degrees in [0, 360)
    pub direction: f64,
    pub speed: Option<f64>,
    pub position: Option<Position>,
}

impl WindSample {
    pub fn new(timestamp: DateTime<Utc>, direction: f64) -> Self {
        Self {
            timestamp,
            direction: normalize_angle(direction),
            speed: None,
            position: None,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = (speed.is_finite() && speed >= 0.0).then_some(speed);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }
}

/// Raw wind row as supplied by an importer
///
/// Every measurement column is optional; rows without a usable direction
/// are dropped during normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub direction: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl WindRecord {
    pub fn new(timestamp: DateTime<Utc>, direction: f64) -> Self {
        Self {
            timestamp,
            direction: Some(direction),
            ..Default::default()
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Convert to a sample, or `None` when the row has no usable direction
    pub fn to_sample(&self) -> Option<WindSample> {
        let direction = self.direction.filter(|d| d.is_finite())?;
        Some(WindSample {
            timestamp: self.timestamp,
            direction: normalize_angle(direction),
            speed: self.speed.filter(|s| s.is_finite() && *s >= 0.0),
            position: Position::from_parts(self.latitude, self.longitude),
        })
    }
}

/// Normalize raw rows into time-ordered samples.
///
/// Returns the samples and the number of rows dropped for lacking a direction.
pub fn normalize_records(records: &[WindRecord]) -> (Vec<WindSample>, usize) {
    let mut samples: Vec<WindSample> = records.iter().filter_map(WindRecord::to_sample).collect();
    let dropped = records.len() - samples.len();
    samples.sort_by_key(|s| s.timestamp);
    (samples, dropped)
}

/// One point of the vessel's GPS track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub course: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
}

impl TrackPoint {
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            course: None,
            speed: None,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude)
    }
}

/// Named point on the race course (mark, layline, favoured side...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPoint {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub position: Position,
}

impl ContextPoint {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, position: Position) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            position,
        }
    }
}

/// Course layout used to put detected shifts in tactical context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseContext {
    #[serde(default)]
    pub marks: Vec<ContextPoint>,
    #[serde(default)]
    pub strategic_points: Vec<ContextPoint>,
}

impl CourseContext {
    /// Marks first, then strategic points
    pub fn all_points(&self) -> impl Iterator<Item = &ContextPoint> {
        self.marks.iter().chain(self.strategic_points.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty() && self.strategic_points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_record_without_direction_is_dropped() {
        let records = vec![
            WindRecord::new(ts(10), 370.0),
            WindRecord {
                timestamp: ts(0),
                speed: Some(8.0),
                ..Default::default()
            },
            WindRecord::new(ts(5), f64::NAN),
        ];

        let (samples, dropped) = normalize_records(&records);
        assert_eq!(dropped, 2);
        assert_eq!(samples.len(), 1);
        assert!((samples[0].direction - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalization_sorts_and_cleans() {
        let records = vec![
            WindRecord::new(ts(20), -30.0).with_speed(-1.0),
            WindRecord::new(ts(10), 45.0)
                .with_speed(12.0)
                .with_position(43.5, 7.1),
        ];

        let (samples, _) = normalize_records(&records);
        assert_eq!(samples[0].timestamp, ts(10));
        assert_eq!(samples[0].speed, Some(12.0));
        assert_eq!(samples[0].position, Some(Position::new(43.5, 7.1)));
        assert!((samples[1].direction - 330.0).abs() < 1e-9);
        assert_eq!(samples[1].speed, None, "negative speed should be discarded");
    }

    #[test]
    fn test_half_position_is_ignored() {
        let record = WindRecord {
            timestamp: ts(0),
            direction: Some(90.0),
            latitude: Some(10.0),
            ..Default::default()
        };
        assert_eq!(record.to_sample().unwrap().position, None);
    }
}
