//! Instantaneous ground speed from a GPS track.
//!
//! Speed is measured between the position resolved at the query time and the
//! position resolved one second earlier, divided by the time that actually
//! separates the two fixes. Wherever that is undefined (no coverage, missing
//! timestamps, both lookups landing on the same fix) the speed is `0.0`.

use chrono::{DateTime, FixedOffset, TimeDelta};

use crate::track::{Track, Waypoint};

/// Meters per second to miles per hour.
pub const MPS_TO_MPH: f64 = 2.236_936_292_054_402;

/// How far back, in seconds, the second position is looked up.
pub const SPEED_LOOKBACK_SECONDS: i64 = 1;

/// Speed in m/s between two fixes, or `None` if their elapsed time is zero
/// or unknown.
pub fn speed_between(a: &Waypoint, b: &Waypoint) -> Option<f64> {
    let elapsed = (a.time? - b.time?).num_microseconds()?.unsigned_abs() as f64 / 1e6;
    if elapsed <= 0.0 {
        return None;
    }
    Some(a.distance_to(b) / elapsed)
}

/// Ground speed in m/s at `time`.
pub fn estimate_speed(track: &Track, time: DateTime<FixedOffset>) -> f64 {
    match track.resolve(time).first() {
        Some(anchor) => estimate_speed_from(track, anchor, time),
        None => 0.0,
    }
}

/// Ground speed in m/s at `time`, measured against an already-resolved
/// `anchor` position for that time.
pub fn estimate_speed_from(track: &Track, anchor: &Waypoint, time: DateTime<FixedOffset>) -> f64 {
    let Some(lookback) = time.checked_sub_signed(TimeDelta::seconds(SPEED_LOOKBACK_SECONDS))
    else {
        return 0.0;
    };
    track
        .resolve(lookback)
        .first()
        .and_then(|earlier| speed_between(anchor, earlier))
        .unwrap_or(0.0)
}
