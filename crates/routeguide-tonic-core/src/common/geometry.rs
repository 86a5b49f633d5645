//! Fixed-point coordinate math.
//!
//! Every place that turns a [`Point`] into real-valued degrees goes through
//! [`decode_degrees`], and every place that turns a geo store position back
//! into a [`Point`] goes through [`encode_degrees`]. Distances use the
//! haversine formula on a sphere of [`EARTH_RADIUS_METERS`].
//!
//! None of these functions validate their input. Polar, antipodal and
//! out-of-range coordinates flow through the same arithmetic and produce
//! defined results.

use crate::{
    proto::{Point, Rectangle},
    types::{COORD_FACTOR, EARTH_RADIUS_METERS},
};

/// Converts a fixed-point coordinate to degrees.
#[inline]
pub fn decode_degrees(fixed: i32) -> f64 {
    f64::from(fixed) / COORD_FACTOR
}

/// Converts degrees to a fixed-point coordinate, rounding to the nearest
/// integer.
///
/// Out-of-range values saturate at `i32::MIN`/`i32::MAX` and `NaN` maps to 0.
#[inline]
pub fn encode_degrees(degrees: f64) -> i32 {
    (degrees * COORD_FACTOR).round() as i32
}

/// Builds a [`Point`] from real-valued longitude and latitude, the argument
/// order geo stores use.
pub fn point_from_degrees(longitude: f64, latitude: f64) -> Point {
    Point::new(encode_degrees(latitude), encode_degrees(longitude))
}

/// Great-circle distance in meters between two positions given in degrees.
pub fn haversine_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    // abs() keeps the result bit-identical when the endpoints are swapped.
    let delta_lat = (lat2 - lat1).abs();
    let delta_lon = (lon2.to_radians() - lon1.to_radians()).abs();

    let half_lat = (delta_lat / 2.0).sin();
    let half_lon = (delta_lon / 2.0).sin();
    let a = half_lat * half_lat + lat1.cos() * lat2.cos() * half_lon * half_lon;
    // Rounding can push `a` a hair outside [0, 1], which would make the
    // square roots below return NaN.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Great-circle distance in whole meters between two fixed-point points.
///
/// The result is truncated toward zero, never rounded. It is symmetric, zero
/// for identical points, and never negative.
pub fn haversine_distance_meters(start: &Point, end: &Point) -> i32 {
    let meters = haversine_degrees(
        decode_degrees(start.latitude),
        decode_degrees(start.longitude),
        decode_degrees(end.latitude),
        decode_degrees(end.longitude),
    );
    meters as i32
}

/// A [`Rectangle`] with its corners sorted into edges.
///
/// Clients may send `lo` and `hi` in any order, so consumers always work on the
/// normalized edges. The search radius is derived from the corners as sent:
/// half the diagonal, which is an approximation of the enclosing circle and is
/// kept as-is because it decides which features a query returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
    search_radius_meters: i32,
}

impl BoundingBox {
    pub fn from_rectangle(rect: &Rectangle) -> Self {
        let (lo, hi) = rect.corners();
        Self {
            left: lo.longitude.min(hi.longitude),
            right: lo.longitude.max(hi.longitude),
            top: lo.latitude.max(hi.latitude),
            bottom: lo.latitude.min(hi.latitude),
            search_radius_meters: haversine_distance_meters(&lo, &hi) / 2,
        }
    }

    /// Midpoint of the normalized edges.
    pub fn center(&self) -> Point {
        Point::new(midpoint(self.bottom, self.top), midpoint(self.left, self.right))
    }

    /// Radius in meters to query around [`center`](Self::center).
    pub const fn search_radius_meters(&self) -> i32 {
        self.search_radius_meters
    }

    /// Whether `point` lies inside the box, edges included.
    pub fn contains(&self, point: &Point) -> bool {
        (self.left..=self.right).contains(&point.longitude)
            && (self.bottom..=self.top).contains(&point.latitude)
    }
}

// Widened so that two large coordinates cannot overflow.
fn midpoint(a: i32, b: i32) -> i32 {
    ((i64::from(a) + i64::from(b)) / 2) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: [Point; 6] = [
        Point::new(0, 0),
        Point::new(407_838_351, -746_143_763),
        Point::new(-339_000_000, 1_512_000_000),
        Point::new(900_000_000, 0),
        Point::new(-900_000_000, 1_800_000_000),
        Point::new(i32::MAX, i32::MIN),
    ];

    #[test]
    fn decodes_fixed_point() {
        assert_eq!(decode_degrees(0), 0.0);
        assert_eq!(decode_degrees(10_000_000), 1.0);
        assert_eq!(decode_degrees(-745_000_000), -74.5);
    }

    #[test]
    fn encode_rounds_to_nearest() {
        assert_eq!(encode_degrees(40.783_835_1), 407_838_351);
        assert_eq!(encode_degrees(-74.614_376_3), -746_143_763);
        assert_eq!(encode_degrees(1e10), i32::MAX);
        assert_eq!(encode_degrees(f64::NAN), 0);
    }

    #[test]
    fn distance_is_symmetric() {
        for a in &SAMPLE {
            for b in &SAMPLE {
                assert_eq!(
                    haversine_distance_meters(a, b),
                    haversine_distance_meters(b, a),
                    "{a:?} <-> {b:?}"
                );
            }
        }
    }

    #[test]
    fn distance_to_self_is_zero() {
        for p in &SAMPLE {
            assert_eq!(haversine_distance_meters(p, p), 0);
        }
    }

    #[test]
    fn distance_is_non_negative() {
        for a in &SAMPLE {
            for b in &SAMPLE {
                assert!(haversine_distance_meters(a, b) >= 0);
            }
        }
    }

    #[test]
    fn quarter_circumference_along_equator() {
        let origin = Point::new(0, 0);
        let quarter = Point::new(0, 900_000_000);
        // 6_371_000 * pi / 2 = 10_007_543.398..., truncated.
        assert_eq!(haversine_distance_meters(&origin, &quarter), 10_007_543);
    }

    #[test]
    fn antipodal_points_are_accepted() {
        let d = haversine_distance_meters(&Point::new(0, 0), &Point::new(0, 1_800_000_000));
        // Half the circumference, within truncation.
        assert!((20_015_086..=20_015_087).contains(&d), "{d}");
    }

    #[test]
    fn normalizes_swapped_corners() {
        let lo = Point::new(400_000_000, -750_000_000);
        let hi = Point::new(420_000_000, -730_000_000);

        let ordered = BoundingBox::from_rectangle(&Rectangle::new(lo, hi));
        let swapped = BoundingBox::from_rectangle(&Rectangle::new(hi, lo));

        assert_eq!(ordered, swapped);
        assert_eq!(ordered.left, -750_000_000);
        assert_eq!(ordered.right, -730_000_000);
        assert_eq!(ordered.top, 420_000_000);
        assert_eq!(ordered.bottom, 400_000_000);
        assert_eq!(ordered.center(), Point::new(410_000_000, -740_000_000));
        assert_eq!(
            ordered.search_radius_meters(),
            haversine_distance_meters(&lo, &hi) / 2
        );
    }

    #[test]
    fn normalizes_mixed_corners() {
        // Corners that are neither lo/hi nor hi/lo on both axes.
        let a = Point::new(420_000_000, -750_000_000);
        let b = Point::new(400_000_000, -730_000_000);
        let bbox = BoundingBox::from_rectangle(&Rectangle::new(a, b));
        assert_eq!(bbox.center(), Point::new(410_000_000, -740_000_000));
        assert!(bbox.contains(&Point::new(410_000_000, -740_000_000)));
        assert!(!bbox.contains(&Point::new(430_000_000, -740_000_000)));
    }

    #[test]
    fn degenerate_rectangle_has_zero_radius() {
        let p = Point::new(407_838_351, -746_143_763);
        let bbox = BoundingBox::from_rectangle(&Rectangle::new(p, p));
        assert_eq!(bbox.search_radius_meters(), 0);
        assert_eq!(bbox.center(), p);
    }

    #[test]
    fn midpoint_does_not_overflow() {
        assert_eq!(midpoint(i32::MAX, i32::MAX), i32::MAX);
        assert_eq!(midpoint(i32::MIN, i32::MIN), i32::MIN);
    }
}
