//! In-memory GPS track and position resolution.
//!
//! A [`Track`] is an ordered list of [`Segment`]s, each an ordered run of
//! [`Waypoint`]s. Gaps in the recording (pauses, signal loss) show up as
//! segment boundaries. [`Track::resolve`] answers "where was the camera at
//! time T" by snapping forward to the first fix at or after T.
//!
//! # Example
//!
//! ```
//! use chrono::DateTime;
//! use geoframes::{Segment, Track, Waypoint};
//!
//! let t0 = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap();
//! let t1 = DateTime::parse_from_rfc3339("2024-05-01T10:00:01Z").unwrap();
//!
//! let track = Track::new(vec![Segment::new(vec![
//!     Waypoint::new(Some(t0), 51.5000, -0.1200),
//!     Waypoint::new(Some(t1), 51.5001, -0.1200),
//! ])]);
//!
//! let query = DateTime::parse_from_rfc3339("2024-05-01T10:00:00.4Z").unwrap();
//! let found = track.resolve(query);
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].time, Some(t1));
//! ```

use chrono::{DateTime, FixedOffset};
use geo::{HaversineDistance, Point};

/// One timestamped GPS fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    /// Capture time of the fix, if the receiver reported one.
    pub time: Option<DateTime<FixedOffset>>,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Direction of travel in degrees from true north, if known.
    pub course: Option<f64>,
}

impl Waypoint {
    /// Create a waypoint without course information.
    pub fn new(time: Option<DateTime<FixedOffset>>, latitude: f64, longitude: f64) -> Self {
        Self {
            time,
            latitude,
            longitude,
            course: None,
        }
    }

    /// Attach a course (heading) in degrees.
    #[must_use]
    pub fn with_course(mut self, course: f64) -> Self {
        self.course = Some(course);
        self
    }

    /// Great-circle distance to `other` in meters, ignoring elevation.
    pub fn distance_to(&self, other: &Waypoint) -> f64 {
        self.point().haversine_distance(&other.point())
    }

    fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// A temporally contiguous run of waypoints.
///
/// Waypoint times are expected to be non-decreasing; they are not re-sorted.
#[derive(Debug, Clone, Default)]
pub struct Segment {
    waypoints: Vec<Waypoint>,
    /// Every waypoint carries a time, so binary search is valid.
    fully_timed: bool,
}

impl Segment {
    /// Create a segment from waypoints in recording order.
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        let fully_timed = waypoints.iter().all(|waypoint| waypoint.time.is_some());
        Self {
            waypoints,
            fully_timed,
        }
    }

    /// The waypoints of this segment, in recording order.
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Number of waypoints in the segment.
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Returns `true` if the segment holds no waypoints.
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Time of the first and last fix, when both are time-tagged.
    pub fn time_span(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        let first = self.waypoints.first()?.time?;
        let last = self.waypoints.last()?.time?;
        Some((first, last))
    }

    /// Whether the segment can answer a query for `time`.
    ///
    /// Segments without time-tagged endpoints are always considered in range.
    fn covers(&self, time: DateTime<FixedOffset>) -> bool {
        match self.time_span() {
            Some((first, last)) => first <= time && time <= last,
            None => true,
        }
    }

    /// First waypoint whose time is at or after `time`.
    fn first_at_or_after(&self, time: DateTime<FixedOffset>) -> Option<&Waypoint> {
        if self.fully_timed {
            let index = self
                .waypoints
                .partition_point(|waypoint| waypoint.time.is_some_and(|t| t < time));
            return self.waypoints.get(index);
        }

        self.waypoints
            .iter()
            .find(|waypoint| waypoint.time.is_some_and(|t| t >= time))
    }
}

/// A complete GPS track for one recording.
#[derive(Debug, Clone, Default)]
pub struct Track {
    segments: Vec<Segment>,
}

impl Track {
    /// Create a track from segments in recording order.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// The segments of this track.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total number of waypoints across all segments.
    pub fn waypoint_count(&self) -> usize {
        self.segments.iter().map(Segment::len).sum()
    }

    /// Returns `true` if the track holds no waypoints at all.
    pub fn is_empty(&self) -> bool {
        self.waypoint_count() == 0
    }

    /// Earliest and latest fix times across all segments.
    pub fn time_span(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        self.segments
            .iter()
            .filter_map(Segment::time_span)
            .reduce(|(start, end), (first, last)| (start.min(first), end.max(last)))
    }

    /// Summed great-circle length of all segments in meters.
    pub fn length(&self) -> f64 {
        self.segments
            .iter()
            .map(|segment| {
                segment
                    .waypoints
                    .windows(2)
                    .map(|pair| pair[0].distance_to(&pair[1]))
                    .sum::<f64>()
            })
            .sum()
    }

    /// Estimated position(s) at `time`.
    ///
    /// Each segment whose time-tagged endpoints bracket `time` (inclusive)
    /// contributes its first waypoint at or after `time`. Segments without
    /// time-tagged endpoints are scanned as well. There is no interpolation
    /// between fixes.
    ///
    /// The result is empty when the track is empty or no segment covers
    /// `time`. More than one result means segments overlap; callers use the
    /// first one.
    pub fn resolve(&self, time: DateTime<FixedOffset>) -> Vec<&Waypoint> {
        self.segments
            .iter()
            .filter(|segment| !segment.is_empty() && segment.covers(time))
            .filter_map(|segment| segment.first_at_or_after(time))
            .collect()
    }

    /// The first estimate from [`resolve`](Track::resolve), warning when the
    /// track is ambiguous at `time`.
    pub fn position_at(&self, time: DateTime<FixedOffset>) -> Option<&Waypoint> {
        let candidates = self.resolve(time);
        if candidates.len() > 1 {
            log::warn!(
                "{} GPS positions found for {time}, using the first",
                candidates.len()
            );
        }
        candidates.into_iter().next()
    }
}
