//! Track index and position resolution tests.

use chrono::{DateTime, FixedOffset, TimeDelta};
use geoframes::{Segment, Track, Waypoint};

fn at(seconds: i64) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap() + TimeDelta::seconds(seconds)
}

fn at_millis(millis: i64) -> DateTime<FixedOffset> {
    at(0) + TimeDelta::milliseconds(millis)
}

fn segment(times: &[i64], longitude_offset: f64) -> Segment {
    Segment::new(
        times
            .iter()
            .enumerate()
            .map(|(i, &t)| Waypoint::new(Some(at(t)), 0.0, longitude_offset + i as f64 * 0.0001))
            .collect(),
    )
}

// ── resolve ────────────────────────────────────────────────────────

#[test]
fn exact_match_returns_that_fix() {
    let track = Track::new(vec![segment(&[0, 1, 2, 3], 0.0)]);
    let found = track.resolve(at(2));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].time, Some(at(2)));
}

#[test]
fn between_fixes_snaps_forward() {
    let track = Track::new(vec![segment(&[0, 1, 2, 3], 0.0)]);
    let found = track.resolve(at_millis(1_001));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].time, Some(at(2)));
}

#[test]
fn first_fix_for_every_query_in_range() {
    let times = [0, 2, 3, 7, 8, 12];
    let track = Track::new(vec![segment(&times, 0.0)]);

    for millis in (0..=12_000).step_by(250) {
        let query = at_millis(millis);
        let expected = times
            .iter()
            .map(|&t| at(t))
            .find(|&t| t >= query);
        let found = track.resolve(query);
        assert_eq!(found.len(), 1, "query at {millis}ms");
        assert_eq!(found[0].time, expected, "query at {millis}ms");
    }
}

#[test]
fn query_outside_segment_is_empty() {
    let track = Track::new(vec![segment(&[10, 11, 12], 0.0)]);
    assert!(track.resolve(at(9)).is_empty());
    assert!(track.resolve(at_millis(12_001)).is_empty());
    assert_eq!(track.resolve(at(10)).len(), 1);
    assert_eq!(track.resolve(at(12)).len(), 1);
}

#[test]
fn empty_track_resolves_nothing() {
    let track = Track::default();
    assert!(track.is_empty());
    assert!(track.resolve(at(0)).is_empty());
    assert!(track.position_at(at(0)).is_none());
}

#[test]
fn empty_segments_are_ignored() {
    let track = Track::new(vec![Segment::default(), segment(&[0, 1], 0.0)]);
    assert_eq!(track.resolve(at(1)).len(), 1);
}

#[test]
fn later_segment_is_checked_after_out_of_range_one() {
    let track = Track::new(vec![segment(&[0, 1, 2], 0.0), segment(&[10, 11, 12], 1.0)]);

    let found = track.resolve(at(11));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].time, Some(at(11)));
    assert!(found[0].longitude >= 1.0);

    // In the gap between segments there is no coverage.
    assert!(track.resolve(at(5)).is_empty());
}

#[test]
fn overlapping_segments_return_all_candidates_in_order() {
    let track = Track::new(vec![segment(&[0, 2, 4], 0.0), segment(&[1, 3, 5], 1.0)]);

    let found = track.resolve(at(2));
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].time, Some(at(2)));
    assert_eq!(found[1].time, Some(at(3)));

    let first = track.position_at(at(2)).unwrap();
    assert_eq!(first, found[0]);
}

#[test]
fn untimed_waypoints_never_match() {
    let track = Track::new(vec![Segment::new(vec![
        Waypoint::new(Some(at(0)), 0.0, 0.0),
        Waypoint::new(None, 0.0, 0.0005),
        Waypoint::new(Some(at(4)), 0.0, 0.001),
    ])]);

    let found = track.resolve(at(1));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].time, Some(at(4)));
}

// ── summaries ──────────────────────────────────────────────────────

#[test]
fn counts_span_and_length() {
    let track = Track::new(vec![segment(&[5, 6], 0.0), segment(&[0, 1, 2], 1.0)]);

    assert_eq!(track.waypoint_count(), 5);
    assert_eq!(track.segments().len(), 2);
    assert_eq!(track.time_span(), Some((at(0), at(6))));

    let a = Waypoint::new(None, 0.0, 0.0);
    let b = Waypoint::new(None, 0.0, 0.0001);
    let step = a.distance_to(&b);
    assert!((track.length() - 3.0 * step).abs() < 1e-6);
}

#[test]
fn distance_is_haversine_meters() {
    // One degree of latitude on the mean-radius sphere.
    let a = Waypoint::new(None, 0.0, 0.0);
    let b = Waypoint::new(None, 1.0, 0.0);
    let meters = a.distance_to(&b);
    assert!((meters - 111_195.0).abs() < 1.0, "got {meters}");
    assert!((a.distance_to(&b) - b.distance_to(&a)).abs() < 1e-9);
}

#[test]
fn with_course_sets_heading() {
    let waypoint = Waypoint::new(Some(at(0)), 1.0, 2.0).with_course(270.0);
    assert_eq!(waypoint.course, Some(270.0));
}
