//! Spherical geometry: lat/lon projection, great-circle distance, arc paths.
//!
//! All 3D points live on (or above) a sphere centered at the origin, using
//! the convention that latitude 90° maps to +Y and longitude is measured
//! with a seam at ±180°. `lat_lon_to_vector` and `vector_to_lat_lon` are
//! exact inverses of each other away from the poles.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Degrees-to-radians factor.
pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Mean Earth radius used for distance estimates.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic coordinate pair in degrees.
///
/// Latitude in [-90, 90], longitude in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Converts latitude/longitude to a Cartesian position on a sphere surface.
pub fn lat_lon_to_vector(lat: f64, lon: f64, radius: f64) -> Vector3<f64> {
    let phi = (90.0 - lat) * DEG_TO_RAD;
    let theta = (lon + 180.0) * DEG_TO_RAD;

    let x = -(radius * phi.sin() * theta.cos());
    let y = radius * phi.cos();
    let z = radius * phi.sin() * theta.sin();

    Vector3::new(x, y, z)
}

/// Recovers latitude/longitude from a point on (or above) the sphere.
///
/// The point is normalized first, so any positive radius works. Longitude
/// is undefined at the poles; callers stay inside (-90, 90) latitude.
pub fn vector_to_lat_lon(point: &Vector3<f64>) -> LatLon {
    let r = point.norm();
    let unit = if r > 0.0 { point / r } else { *point };

    let phi = unit.y.clamp(-1.0, 1.0).acos();
    let lat = 90.0 - phi / DEG_TO_RAD;

    // theta was (lon + 180) degrees; atan2 recovers it modulo 2*pi.
    let mut theta = unit.z.atan2(-unit.x);
    if theta < 0.0 {
        theta += 2.0 * std::f64::consts::PI;
    }
    let lon = theta / DEG_TO_RAD - 180.0;

    LatLon::new(lat, lon)
}

/// Great-circle distance between two lat/lon points in kilometers.
///
/// Haversine formula; symmetric, zero for identical points, at most
/// ~20,015 km (antipodal).
pub fn great_circle_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1) * DEG_TO_RAD;
    let d_lon = (lon2 - lon1) * DEG_TO_RAD;

    let a = (d_lat / 2.0).sin().powi(2)
        + (lat1 * DEG_TO_RAD).cos() * (lat2 * DEG_TO_RAD).cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Angle between two position vectors, in radians.
pub fn angular_distance(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let denom = a.norm() * b.norm();
    if denom == 0.0 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

/// Default arc peak height: longer arcs rise higher above the surface.
pub fn arc_peak_height(start: &Vector3<f64>, end: &Vector3<f64>) -> f64 {
    0.15 + (angular_distance(start, end) / std::f64::consts::PI) * 0.6
}

/// Builds `segments + 1` points along an arc between two surface
/// positions, re-normalized onto the sphere at each step and lifted by a
/// parabolic profile that is zero at both endpoints and peaks midway.
pub fn build_arc_path(
    start_lat: f64,
    start_lon: f64,
    end_lat: f64,
    end_lon: f64,
    radius: f64,
    segments: usize,
    peak_height: f64,
) -> Vec<Vector3<f64>> {
    let start = lat_lon_to_vector(start_lat, start_lon, radius);
    let end = lat_lon_to_vector(end_lat, end_lon, radius);

    let mut points = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let t = i as f64 / segments as f64;

        let chord = start.lerp(&end, t);
        let dir = chord.try_normalize(1.0e-12).unwrap_or_else(Vector3::zeros);

        let elevation = peak_height * 4.0 * t * (1.0 - t);
        points.push(dir * (radius + elevation));
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_projection_known_points() {
        // North pole is +Y regardless of longitude.
        let pole = lat_lon_to_vector(90.0, 0.0, 1.0);
        assert_relative_eq!(pole.y, 1.0, epsilon = 1.0e-12);
        assert_relative_eq!(pole.x, 0.0, epsilon = 1.0e-12);

        // Equator at lon 0 sits on the seam-opposite axis.
        let equator = lat_lon_to_vector(0.0, 0.0, 2.0);
        assert_relative_eq!(equator.norm(), 2.0, epsilon = 1.0e-12);
        assert_relative_eq!(equator.y, 0.0, epsilon = 1.0e-12);
    }

    #[test]
    fn test_projection_round_trip() {
        let cases = [
            (39.0438, -77.4874),
            (-33.8688, 151.2093),
            (1.3521, 103.8198),
            (53.3498, -6.2603),
            (-89.9, 179.9),
        ];
        for (lat, lon) in cases {
            let point = lat_lon_to_vector(lat, lon, 1.0);
            let back = vector_to_lat_lon(&point);
            assert_relative_eq!(back.lat, lat, epsilon = 1.0e-6);
            assert_relative_eq!(back.lon, lon, epsilon = 1.0e-6);
        }
    }

    #[test]
    fn test_distance_symmetry_and_zero() {
        let d1 = great_circle_distance_km(39.0, -77.0, 35.7, 139.7);
        let d2 = great_circle_distance_km(35.7, 139.7, 39.0, -77.0);
        assert_relative_eq!(d1, d2, epsilon = 1.0e-9);

        assert_eq!(great_circle_distance_km(10.0, 20.0, 10.0, 20.0), 0.0);
    }

    #[test]
    fn test_distance_antipodal_bound() {
        // Antipodal points: half the circumference.
        let d = great_circle_distance_km(0.0, 0.0, 0.0, 180.0);
        assert_relative_eq!(d, EARTH_RADIUS_KM * std::f64::consts::PI, epsilon = 1.0e-6);
        assert!(d <= 20_015.1);
    }

    #[test]
    fn test_arc_path_endpoints_on_sphere() {
        let points = build_arc_path(53.3498, -6.2603, 39.0438, -77.4874, 2.0, 64, 0.4);
        assert_eq!(points.len(), 65);

        // Endpoints carry no elevation.
        assert_relative_eq!(points[0].norm(), 2.0, epsilon = 1.0e-9);
        assert_relative_eq!(points[64].norm(), 2.0, epsilon = 1.0e-9);

        // Midpoint carries the full peak.
        assert_relative_eq!(points[32].norm(), 2.4, epsilon = 1.0e-9);
    }

    #[test]
    fn test_arc_path_deterministic() {
        let a = build_arc_path(1.3521, 103.8198, -33.8688, 151.2093, 2.0, 16, 0.3);
        let b = build_arc_path(1.3521, 103.8198, -33.8688, 151.2093, 2.0, 16, 0.3);
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_round_trip(lat in -89.9f64..89.9, lon in -179.9f64..179.9) {
            let back = vector_to_lat_lon(&lat_lon_to_vector(lat, lon, 1.0));
            prop_assert!((back.lat - lat).abs() < 1.0e-4);
            prop_assert!((back.lon - lon).abs() < 1.0e-4);
        }

        #[test]
        fn prop_distance_bounds(
            lat1 in -90.0f64..90.0, lon1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0, lon2 in -180.0f64..180.0,
        ) {
            let d = great_circle_distance_km(lat1, lon1, lat2, lon2);
            prop_assert!(d >= 0.0);
            prop_assert!(d <= 20_015.1);
            let r = great_circle_distance_km(lat2, lon2, lat1, lon1);
            prop_assert!((d - r).abs() < 1.0e-9);
        }
    }
}
