//! Great-circle helpers on WGS84 coordinates.

use geo::{HaversineDestination, HaversineDistance, Point};
use distrack_env::RawFix;

/// Haversine distance in meters between two (latitude, longitude) pairs.
///
/// Uses the mean Earth radius, which is within 0.5% of the ellipsoidal
/// distance at the scales a walking or driving session covers.
pub fn haversine_m(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    // geo points are (x = longitude, y = latitude)
    Point::new(lon_a, lat_a).haversine_distance(&Point::new(lon_b, lat_b))
}

/// Haversine distance in meters between two fixes.
pub fn fix_distance_m(a: &RawFix, b: &RawFix) -> f64 {
    haversine_m(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Projects a local east/north offset in meters from an origin onto WGS84.
///
/// Returns (latitude, longitude).
pub fn offset_latlon(origin_lat: f64, origin_lon: f64, east_m: f64, north_m: f64) -> (f64, f64) {
    let distance = east_m.hypot(north_m);
    if distance == 0.0 {
        return (origin_lat, origin_lon);
    }
    let bearing = east_m.atan2(north_m).to_degrees();
    let dest = Point::new(origin_lon, origin_lat).haversine_destination(bearing, distance);
    (dest.y(), dest.x())
}
