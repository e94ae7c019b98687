//! Unit conversions and the small formatting helpers used by reports.

use std::fmt;
use std::str::FromStr;

use time::Duration;

use crate::errors::TrackError;

/// Nominal radius of the earth in miles. The radius actually varies from
/// 3937 to 3976 mi.
pub const EARTH_RADIUS_MI: f64 = 3956.0;
pub const M2MI: f64 = 0.000_621_371_192_24;
pub const M2FT: f64 = 3.280_839_895;
pub const SEC2HR: f64 = 1.0 / 3600.0;

/// Meters per second to miles per hour.
pub const MPS2MPH: f64 = M2MI / SEC2HR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Feet,
    Miles,
    Meters,
    Kilometers,
}

impl DistanceUnit {
    pub fn to_meters(self, value: f64) -> f64 {
        match self {
            DistanceUnit::Feet => value / M2FT,
            DistanceUnit::Miles => value / M2MI,
            DistanceUnit::Meters => value,
            DistanceUnit::Kilometers => value * 1000.0,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            DistanceUnit::Feet => "ft",
            DistanceUnit::Miles => "mi",
            DistanceUnit::Meters => "m",
            DistanceUnit::Kilometers => "km",
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ft" => Ok(DistanceUnit::Feet),
            "mi" => Ok(DistanceUnit::Miles),
            "m" => Ok(DistanceUnit::Meters),
            "km" => Ok(DistanceUnit::Kilometers),
            other => Err(TrackError::InvalidUnits(other.to_string())),
        }
    }
}

/// A distance as entered by a user: `"<number> <unit>"`, unit defaulting to m.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceQuantity {
    pub magnitude: f64,
    pub unit: DistanceUnit,
}

impl DistanceQuantity {
    pub fn new(magnitude: f64, unit: DistanceUnit) -> Self {
        Self { magnitude, unit }
    }

    pub fn meters(&self) -> f64 {
        self.unit.to_meters(self.magnitude)
    }
}

impl FromStr for DistanceQuantity {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let Some(number) = tokens.next() else {
            return Err(TrackError::InvalidDistance(s.to_string()));
        };
        let magnitude = number
            .parse::<f64>()
            .map_err(|_| TrackError::InvalidDistance(number.to_string()))?;
        let unit = match tokens.next() {
            Some(token) => token.parse()?,
            None => DistanceUnit::Meters,
        };
        Ok(Self { magnitude, unit })
    }
}

impl fmt::Display for DistanceQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit.token())
    }
}

/// `1h 2m 3s` style, omitting zero parts.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.whole_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

/// Pace in minutes per mile for a speed in m/s.
pub fn pace_per_mile(speed_mps: f64) -> Option<Duration> {
    if speed_mps <= 0.0 || !speed_mps.is_finite() {
        return None;
    }
    let seconds_per_mile = 1.0 / (M2MI * speed_mps);
    Some(Duration::seconds_f64(seconds_per_mile.round()))
}
