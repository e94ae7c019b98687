//! Spherical great-circle distance.

use crate::models::Position;
use crate::units::{EARTH_RADIUS_MI, M2MI};

/// Nominal earth radius in meters.
pub const EARTH_RADIUS_M: f64 = EARTH_RADIUS_MI / M2MI;

/// Great-circle distance in meters between two coordinates given in degrees.
///
/// Haversine with the `atan2` form, which stays accurate for points a few
/// centimeters apart.
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1) = (lat1.to_radians(), lon1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lon2.to_radians());

    let slon = ((lon2 - lon1) / 2.0).sin();
    let slat = ((lat2 - lat1) / 2.0).sin();
    // Rounding can push `a` a hair above 1 for antipodal points.
    let a = (slat * slat + lat1.cos() * lat2.cos() * slon * slon).clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

impl Position {
    pub fn distance_to(&self, other: &Position) -> f64 {
        great_circle_distance(self.lat, self.lon, other.lat, other.lon)
    }

    /// Linear interpolation in degree space; `ratio` 0 is `self`, 1 is `other`.
    pub fn lerp(&self, other: &Position, ratio: f64) -> Position {
        Position {
            lat: self.lat + ratio * (other.lat - self.lat),
            lon: self.lon + ratio * (other.lon - self.lon),
        }
    }
}
