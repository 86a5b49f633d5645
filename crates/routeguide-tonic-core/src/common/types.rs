//! # Common RouteGuide Types and Constants
//!
//! Constants shared by every component that does coordinate math, plus small
//! conveniences on the generated protobuf messages.
//!
//! ## Constants
//!
//! - [`COORD_FACTOR`] - Scale between real degrees and fixed-point integers
//! - [`EARTH_RADIUS_METERS`] - Sphere radius used by the haversine formula
//! - [`DEFAULT_FEATURE_RADIUS_METERS`] - Proximity used to decide whether a
//!   point "is" a known feature
//!
//! ## Optional submessages
//!
//! proto3 message fields decode as `Option`. A missing `Point` is treated as
//! the default point `(0, 0)`, which is what every other protobuf runtime
//! reports for an unset submessage.

use crate::proto::{Feature, Point, Rectangle, RouteNote};

/// Fixed-point scale: a coordinate integer is the degree value times 10^7.
pub const COORD_FACTOR: f64 = 1e7;

/// Earth radius in meters used for all distance calculations.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Radius in meters around a point within which a stored feature is considered
/// to be "at" that point.
///
/// The geo store indexes discrete positions, so an exact coordinate match is
/// unlikely; a small radius absorbs encoding jitter.
pub const DEFAULT_FEATURE_RADIUS_METERS: f64 = 10.0;

impl Point {
    pub const fn new(latitude: i32, longitude: i32) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl Rectangle {
    /// Builds a rectangle from two diagonally opposite corners, in any order.
    pub const fn new(lo: Point, hi: Point) -> Self {
        Self {
            lo: Some(lo),
            hi: Some(hi),
        }
    }

    /// Returns both corners, substituting the default point for missing ones.
    pub fn corners(&self) -> (Point, Point) {
        (self.lo.unwrap_or_default(), self.hi.unwrap_or_default())
    }
}

impl Feature {
    /// Builds the "no feature here" sentinel for `location`.
    pub const fn unnamed(location: Point) -> Self {
        Self {
            name: String::new(),
            location: Some(location),
        }
    }

    /// Whether this feature names something, i.e. is not the sentinel.
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }
}

impl RouteNote {
    pub fn new(location: Point, message: impl Into<String>) -> Self {
        Self {
            location: Some(location),
            message: message.into(),
        }
    }

    /// The note's location, or the default point when it was not set.
    pub fn point(&self) -> Point {
        self.location.unwrap_or_default()
    }
}
