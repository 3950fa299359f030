//! Great-circle distance between coordinates.
//!
//! Non-finite input never fails: it yields `f64::INFINITY`, which every
//! radius comparison treats as "outside".

use serde::{Deserialize, Serialize};

/// Mean Earth radius in statute miles.
pub const EARTH_RADIUS_MILES: f64 = 3958.7613;

const DEG: f64 = std::f64::consts::PI / 180.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Haversine distance in miles. Returns `f64::INFINITY` if any component
/// is NaN or infinite.
pub fn distance_miles(a: Coordinate, b: Coordinate) -> f64 {
    if !a.is_finite() || !b.is_finite() {
        return f64::INFINITY;
    }
    if a == b {
        return 0.0;
    }

    let phi1 = a.lat * DEG;
    let phi2 = b.lat * DEG;
    let d_phi = (b.lat - a.lat) * DEG;
    let d_lambda = (b.lon - a.lon) * DEG;

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points.
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_MILES * c
}

/// True when `distance` is a usable value no greater than `radius`.
pub fn within_radius(distance: f64, radius: f64) -> bool {
    distance.is_finite() && distance <= radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CHICAGO: Coordinate = Coordinate { lat: 41.8781, lon: -87.6298 };
    const MILWAUKEE: Coordinate = Coordinate { lat: 43.0389, lon: -87.9065 };

    #[test]
    fn test_distance_to_self_is_zero() {
        assert_eq!(distance_miles(CHICAGO, CHICAGO), 0.0);
    }

    #[test]
    fn test_distance_symmetric() {
        assert_eq!(distance_miles(CHICAGO, MILWAUKEE), distance_miles(MILWAUKEE, CHICAGO));
    }

    #[test]
    fn test_chicago_milwaukee() {
        // ~81 miles as the crow flies
        assert_relative_eq!(distance_miles(CHICAGO, MILWAUKEE), 81.0, epsilon = 2.0);
    }

    #[test]
    fn test_one_degree_latitude() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(1.0, 0.0);
        assert_relative_eq!(distance_miles(a, b), EARTH_RADIUS_MILES * DEG, epsilon = 1e-9);
    }

    #[test]
    fn test_non_finite_is_infinite() {
        let bad = Coordinate::new(f64::NAN, -87.0);
        assert!(distance_miles(bad, CHICAGO).is_infinite());
        assert!(distance_miles(CHICAGO, Coordinate::new(41.0, f64::INFINITY)).is_infinite());
        assert!(distance_miles(bad, bad).is_infinite());
    }

    #[test]
    fn test_infinite_never_within_radius() {
        assert!(!within_radius(f64::INFINITY, 100.0));
        assert!(!within_radius(f64::NAN, 100.0));
        assert!(within_radius(100.0, 100.0));
        assert!(!within_radius(100.01, 100.0));
    }
}
