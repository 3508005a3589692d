//! Great-circle distance between GPS fixes.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    #[inline]
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Distance to another coordinate in kilometers.
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_km(*self, *other)
    }

    /// Linear interpolation between `self` (t = 0) and `other` (t = 1).
    #[must_use]
    pub fn lerp(&self, other: &Coordinate, t: f64) -> Coordinate {
        Coordinate {
            lat: self.lat + (other.lat - self.lat) * t,
            lng: self.lng + (other.lng - self.lng) * t,
        }
    }

    /// Both components are finite and inside the WGS84 range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat.abs() <= 90.0
            && self.lng.abs() <= 180.0
    }
}

/// Haversine great-circle distance in kilometers.
///
/// Symmetric, zero for identical points and never negative. Inputs must be
/// finite; NaN or infinite components produce an unspecified result.
///
/// # Examples
///
/// ```
/// use subroute_core::{distance_km, Coordinate};
///
/// let brisbane = Coordinate::new(-27.4698, 153.0251);
/// let sydney = Coordinate::new(-33.8688, 151.2093);
/// let d = distance_km(brisbane, sydney);
/// assert!((d - 732.0).abs() < 5.0);
/// assert_eq!(distance_km(brisbane, brisbane), 0.0);
/// ```
#[must_use]
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair outside [0, 1] for antipodal points.
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_for_identical_points() {
        let p = Coordinate::new(-27.4698, 153.0251);
        assert_eq!(distance_km(p, p), 0.0);
    }

    #[test]
    fn scenario_points_are_about_110_metres_apart() {
        let origin = Coordinate::new(-27.4698, 153.0251);
        let destination = Coordinate::new(-27.4705, 153.0260);
        let d = distance_km(origin, destination);
        assert!((d - 0.118).abs() < 0.01, "got {d}");
    }

    #[test]
    fn one_degree_of_latitude() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(1.0, 0.0);
        assert!((distance_km(a, b) - 111.195).abs() < 0.01);
    }

    #[test]
    fn antipodal_points_are_half_circumference() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 180.0);
        let half = std::f64::consts::PI * EARTH_RADIUS_KM;
        assert!((distance_km(a, b) - half).abs() < 1e-6);
    }

    #[test]
    fn lerp_endpoints() {
        let a = Coordinate::new(-27.0, 153.0);
        let b = Coordinate::new(-28.0, 152.0);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert_eq!(a.lerp(&b, 0.5), Coordinate::new(-27.5, 152.5));
    }

    #[test]
    fn validity() {
        assert!(Coordinate::new(-27.4, 153.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, f64::NAN).is_valid());
    }

    fn coord() -> impl Strategy<Value = Coordinate> {
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lng)| Coordinate::new(lat, lng))
    }

    proptest! {
        #[test]
        fn prop_symmetric(a in coord(), b in coord()) {
            let ab = distance_km(a, b);
            let ba = distance_km(b, a);
            prop_assert!((ab - ba).abs() < 1e-9);
        }

        #[test]
        fn prop_identity_is_zero(a in coord()) {
            prop_assert_eq!(distance_km(a, a), 0.0);
        }

        #[test]
        fn prop_non_negative_and_bounded(a in coord(), b in coord()) {
            let d = distance_km(a, b);
            prop_assert!(d >= 0.0);
            prop_assert!(d <= std::f64::consts::PI * EARTH_RADIUS_KM + 1e-6);
        }
    }
}
