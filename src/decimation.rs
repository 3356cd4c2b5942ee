//! Spatial decimation of candidate frames.
//!
//! A frame is worth keeping only if its position is far enough from every
//! position already kept. [`DecimationPolicy`] decides what "far enough"
//! means: a fixed distance, or a distance that grows with ground speed so that
//! slow sections are not over-thinned and fast sections do not flood the
//! output with near-identical coverage.
//!
//! # Example
//!
//! ```
//! use geoframes::{AdaptiveDistance, DecimationPolicy};
//!
//! let policy = DecimationPolicy::Adaptive(AdaptiveDistance {
//!     min_distance: 2.0,
//!     min_speed: 5.0,
//!     max_distance: 20.0,
//!     max_speed: 60.0,
//! });
//! assert_eq!(policy.threshold_at_mph(5.0), 2.0);
//! assert_eq!(policy.threshold_at_mph(100.0), 20.0);
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::GeoframesError;
use crate::speed::MPS_TO_MPH;
use crate::track::Waypoint;

/// Speed-dependent distance threshold.
///
/// Below `min_speed` the threshold is `min_distance`, above `max_speed` it is
/// `max_distance`, and in between it is interpolated linearly. Speeds are in
/// miles per hour, distances in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveDistance {
    /// Threshold at or below `min_speed`, in meters.
    pub min_distance: f64,
    /// Speed at which interpolation starts, in mph.
    pub min_speed: f64,
    /// Threshold at or above `max_speed`, in meters.
    pub max_distance: f64,
    /// Speed at which interpolation ends, in mph.
    pub max_speed: f64,
}

impl AdaptiveDistance {
    /// Threshold in meters at `speed_mph`.
    pub fn threshold(&self, speed_mph: f64) -> f64 {
        let t = ((speed_mph - self.min_speed) / (self.max_speed - self.min_speed)).clamp(0.0, 1.0);
        self.min_distance + t * (self.max_distance - self.min_distance)
    }
}

/// How far apart kept frames must be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecimationPolicy {
    /// A single threshold in meters, independent of speed.
    Fixed(f64),
    /// A threshold interpolated from ground speed.
    Adaptive(AdaptiveDistance),
}

impl Default for DecimationPolicy {
    fn default() -> Self {
        DecimationPolicy::Fixed(5.0)
    }
}

impl Display for DecimationPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DecimationPolicy::Fixed(distance) => write!(f, "fixed {distance}m"),
            DecimationPolicy::Adaptive(adaptive) => write!(
                f,
                "adaptive {}m @ {}mph scaling up to {}m @ {}mph",
                adaptive.min_distance,
                adaptive.min_speed,
                adaptive.max_distance,
                adaptive.max_speed,
            ),
        }
    }
}

impl DecimationPolicy {
    /// Check the parameters before a run starts.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframesError::Configuration`] for non-finite or negative
    /// distances, a speed window of zero or negative width, or an adaptive
    /// threshold that would shrink with speed.
    pub fn validate(&self) -> Result<(), GeoframesError> {
        let check_distance = |name: &str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(GeoframesError::Configuration(format!(
                    "{name} must be a non-negative distance, got {value}"
                )))
            }
        };

        match self {
            DecimationPolicy::Fixed(distance) => check_distance("minimum distance", *distance),
            DecimationPolicy::Adaptive(adaptive) => {
                check_distance("adaptive minimum distance", adaptive.min_distance)?;
                check_distance("adaptive maximum distance", adaptive.max_distance)?;

                if !adaptive.min_speed.is_finite() || !adaptive.max_speed.is_finite() {
                    return Err(GeoframesError::Configuration(
                        "adaptive speeds must be finite".to_string(),
                    ));
                }
                if adaptive.max_speed <= adaptive.min_speed {
                    return Err(GeoframesError::Configuration(format!(
                        "adaptive speed window is empty: max speed {} must exceed min speed {}",
                        adaptive.max_speed, adaptive.min_speed
                    )));
                }
                if adaptive.max_distance < adaptive.min_distance {
                    return Err(GeoframesError::Configuration(format!(
                        "adaptive max distance {} is below min distance {}",
                        adaptive.max_distance, adaptive.min_distance
                    )));
                }
                Ok(())
            }
        }
    }

    /// Effective threshold in meters for a ground speed in mph.
    pub fn threshold_at_mph(&self, speed_mph: f64) -> f64 {
        match self {
            DecimationPolicy::Fixed(distance) => *distance,
            DecimationPolicy::Adaptive(adaptive) => adaptive.threshold(speed_mph),
        }
    }

    /// Effective threshold in meters for a ground speed in m/s.
    pub fn threshold(&self, speed_mps: f64) -> f64 {
        self.threshold_at_mph(speed_mps * MPS_TO_MPH)
    }

    /// Whether `candidate` is far enough from everything in `history`.
    ///
    /// `speed_mps` only matters in adaptive mode. History is scanned most
    /// recent first since consecutive kept frames tend to be neighbours; the
    /// answer does not depend on the scan order.
    pub fn keep(&self, history: &DecimationState, candidate: &Waypoint, speed_mps: f64) -> bool {
        let threshold = self.threshold(speed_mps);
        !history
            .iter_recent()
            .any(|kept| kept.distance_to(candidate) < threshold)
    }
}

/// Positions kept so far in the current run.
///
/// Append-only; entries are never removed for the lifetime of a run.
#[derive(Debug, Clone, Default)]
pub struct DecimationState {
    kept: Vec<Waypoint>,
}

impl DecimationState {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a kept position.
    pub fn push(&mut self, position: Waypoint) {
        self.kept.push(position);
    }

    /// Kept positions, most recently kept first.
    pub fn iter_recent(&self) -> impl Iterator<Item = &Waypoint> {
        self.kept.iter().rev()
    }

    /// Kept positions in the order they were kept.
    pub fn as_slice(&self) -> &[Waypoint] {
        &self.kept
    }

    /// Number of kept positions.
    pub fn len(&self) -> usize {
        self.kept.len()
    }

    /// Returns `true` if nothing has been kept yet.
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
