//! Significance Scoring
//!
//! Layers a context-aware score on top of the raw detection confidence so
//! that shifts can be ranked by how much they matter tactically.

use crate::enrich::nearest_point;
use crate::sample::CourseContext;
use crate::signal::ShiftEvent;

const CONFIDENCE_WEIGHT: f64 = 0.3;
const MAGNITUDE_WEIGHT: f64 = 0.3;
const TYPE_WEIGHT: f64 = 0.2;
const SPEED_WEIGHT: f64 = 0.1;
const CONTEXT_WEIGHT: f64 = 0.1;

/// Change (degrees) at which the magnitude term saturates
const MAGNITUDE_SCALE: f64 = 30.0;
const MAX_SPEED_SCORE: f64 = 0.3;
const MAX_CONTEXT_SCORE: f64 = 0.3;

/// Weighted significance in [0, 1]
pub fn evaluate_shift_significance(
    event: &ShiftEvent,
    context: Option<&CourseContext>,
    radius_m: f64,
) -> f64 {
    let magnitude = (event.direction_change.abs() / MAGNITUDE_SCALE).min(1.0);
    let score = CONFIDENCE_WEIGHT * event.confidence
        + MAGNITUDE_WEIGHT * magnitude
        + TYPE_WEIGHT * event.shift_type.weight()
        + SPEED_WEIGHT * speed_score(event)
        + CONTEXT_WEIGHT * context.map_or(0.0, |c| context_score(event, c, radius_m));

    if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 }
}

fn speed_score(event: &ShiftEvent) -> f64 {
    match (event.before_speed, event.speed_change()) {
        (Some(before), Some(delta)) if before > 0.0 => (delta.abs() / before).min(MAX_SPEED_SCORE),
        _ => 0.0,
    }
}

/// Proximity to the nearest strategic point, linear from 0.3 at the point to 0 at the radius
fn context_score(event: &ShiftEvent, context: &CourseContext, radius_m: f64) -> f64 {
    let Some(position) = event.position else {
        return 0.0;
    };
    match nearest_point(&context.strategic_points, position) {
        Some((_, distance)) if radius_m > 0.0 && distance < radius_m => {
            MAX_CONTEXT_SCORE * (1.0 - distance / radius_m)
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{ContextPoint, Position};
    use crate::signal::ShiftType;
    use chrono::{TimeZone, Utc};

    fn event(change: f64, confidence: f64, shift_type: ShiftType) -> ShiftEvent {
        let t = Utc.timestamp_opt(0, 0).unwrap();
        ShiftEvent::new(t, 100.0, 100.0 + change, confidence, "statistical").with_shift_type(shift_type)
    }

    #[test]
    fn test_weighted_sum() {
        // 0.3*0.8 + 0.3*(15/30) + 0.2*1.0
        let score = evaluate_shift_significance(&event(15.0, 0.8, ShiftType::Persistent), None, 500.0);
        assert!((score - 0.59).abs() < 1e-9, "score {}", score);

        let weaker = evaluate_shift_significance(&event(15.0, 0.8, ShiftType::Oscillation), None, 500.0);
        assert!(weaker < score);
    }

    #[test]
    fn test_speed_score_is_capped() {
        let e = event(30.0, 1.0, ShiftType::Persistent).with_speeds(Some(10.0), Some(20.0));
        // 0.3 + 0.3 + 0.2 + 0.1*0.3
        let score = evaluate_shift_significance(&e, None, 500.0);
        assert!((score - 0.83).abs() < 1e-9, "score {}", score);
    }

    #[test]
    fn test_context_rewards_proximity() {
        let here = Position::new(43.0, 7.0);
        let course = CourseContext {
            marks: vec![ContextPoint::new("Gate", "mark", here)],
            strategic_points: vec![ContextPoint::new("Right side", "favored_side", here)],
        };
        let e = event(30.0, 1.0, ShiftType::Persistent)
            .with_speeds(Some(10.0), Some(20.0))
            .with_position(Some(here));
        let score = evaluate_shift_significance(&e, Some(&course), 500.0);
        assert!((score - 0.86).abs() < 1e-9, "score {}", score);

        let far = e.clone().with_position(Some(Position::new(44.0, 7.0)));
        assert!((evaluate_shift_significance(&far, Some(&course), 500.0) - 0.83).abs() < 1e-9);
    }

    #[test]
    fn test_marks_alone_do_not_score() {
        let here = Position::new(43.0, 7.0);
        let course = CourseContext {
            marks: vec![ContextPoint::new("Gate", "mark", here)],
            strategic_points: vec![],
        };
        let e = event(10.0, 0.7, ShiftType::Phase).with_position(Some(here));
        assert_eq!(
            evaluate_shift_significance(&e, Some(&course), 500.0),
            evaluate_shift_significance(&e, None, 500.0)
        );
    }
}
