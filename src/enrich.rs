//! Positional Enrichment
//!
//! Joins boat positions onto wind samples and attaches the nearest course
//! feature to detected shifts. Both are pure: inputs are never modified,
//! the joined samples come back as a new vector.

use crate::sample::{ContextPoint, CourseContext, Position, TrackPoint, WindSample};
use crate::signal::{EventContext, ShiftEvent};
use tracing::debug;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters
pub fn haversine_m(a: Position, b: Position) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Give each sample without a position the nearest track fix within `tolerance_s`
pub fn join_track_positions(
    samples: &[WindSample],
    track: &[TrackPoint],
    tolerance_s: f64,
) -> Vec<WindSample> {
    let mut fixes: Vec<&TrackPoint> = track
        .iter()
        .filter(|p| p.latitude.is_finite() && p.longitude.is_finite())
        .collect();
    fixes.sort_by_key(|p| p.timestamp);
    if fixes.is_empty() {
        return samples.to_vec();
    }

    let mut joined = 0usize;
    let out = samples
        .iter()
        .map(|sample| {
            let mut sample = sample.clone();
            if sample.position.is_none() {
                let at = fixes.partition_point(|p| p.timestamp < sample.timestamp);
                let nearest = [at.checked_sub(1), Some(at)]
                    .into_iter()
                    .flatten()
                    .filter_map(|k| fixes.get(k))
                    .map(|p| {
                        let gap = (p.timestamp - sample.timestamp).num_milliseconds().abs() as f64 / 1000.0;
                        (p, gap)
                    })
                    .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
                if let Some((fix, gap)) = nearest {
                    if gap <= tolerance_s {
                        sample.position = Some(fix.position());
                        joined += 1;
                    }
                }
            }
            sample
        })
        .collect();

    debug!(joined, samples = samples.len(), "Joined track positions");
    out
}

/// Nearest point of an iterator, with its distance in meters
pub fn nearest_point<'a, I>(points: I, position: Position) -> Option<(&'a ContextPoint, f64)>
where
    I: IntoIterator<Item = &'a ContextPoint>,
{
    points
        .into_iter()
        .map(|p| (p, haversine_m(position, p.position)))
        .filter(|(_, d)| d.is_finite())
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

/// Attach the nearest mark or strategic point within `radius_m` to each event
pub fn attach_course_context(events: &mut [ShiftEvent], course: &CourseContext, radius_m: f64) {
    for event in events.iter_mut() {
        let Some(position) = event.position else {
            debug!(timestamp = %event.timestamp, "Event has no position, context skipped");
            continue;
        };
        if let Some((point, distance)) = nearest_point(course.all_points(), position) {
            if distance <= radius_m {
                event.context = Some(EventContext {
                    name: point.name.clone(),
                    kind: point.kind.clone(),
                    distance_m: distance,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_haversine_one_degree_of_latitude() {
        let d = haversine_m(Position::new(0.0, 0.0), Position::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 10.0, "distance {}", d);
        assert_eq!(haversine_m(Position::new(45.0, 7.0), Position::new(45.0, 7.0)), 0.0);
    }

    #[test]
    fn test_join_uses_nearest_fix_within_tolerance() {
        let samples = vec![
            WindSample::new(ts(0), 90.0),
            WindSample::new(ts(100), 90.0),
            WindSample::new(ts(1000), 90.0),
            WindSample::new(ts(50), 90.0).with_position(Position::new(1.0, 1.0)),
        ];
        let track = vec![
            TrackPoint::new(ts(120), 10.0, 20.0),
            TrackPoint::new(ts(-10), 11.0, 21.0),
        ];

        let joined = join_track_positions(&samples, &track, 300.0);
        assert_eq!(joined[0].position, Some(Position::new(11.0, 21.0)));
        assert_eq!(joined[1].position, Some(Position::new(10.0, 20.0)));
        assert_eq!(joined[2].position, None, "880 s away is beyond the tolerance");
        assert_eq!(joined[3].position, Some(Position::new(1.0, 1.0)), "existing position kept");
        assert!(samples[0].position.is_none(), "input untouched");
    }

    #[test]
    fn test_context_attached_within_radius() {
        let here = Position::new(43.0, 7.0);
        let course = CourseContext {
            marks: vec![ContextPoint::new("Windward", "mark", Position::new(43.003, 7.0))],
            strategic_points: vec![ContextPoint::new("Left lift", "favored_side", Position::new(43.001, 7.0))],
        };
        let mut events = vec![
            ShiftEvent::new(ts(0), 10.0, 30.0, 0.9, "statistical").with_position(Some(here)),
            ShiftEvent::new(ts(0), 10.0, 30.0, 0.9, "statistical")
                .with_position(Some(Position::new(44.0, 7.0))),
            ShiftEvent::new(ts(0), 10.0, 30.0, 0.9, "statistical"),
        ];
        attach_course_context(&mut events, &course, 500.0);

        let ctx = events[0].context.as_ref().unwrap();
        assert_eq!(ctx.name, "Left lift");
        assert!((ctx.distance_m - 111.2).abs() < 1.0);
        assert!(events[1].context.is_none());
        assert!(events[2].context.is_none());
    }
}
