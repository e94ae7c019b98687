//! Time-zone lookup for converting activity times to local time.
//!
//! [`TzfZones`] maps coordinates to IANA zones with daylight-saving rules.
//! [`NauticalZones`] is a rule-free fallback of whole-hour longitude bands.

use std::fmt;

use chrono::{Offset, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, warn};
use tzf_rs::DefaultFinder;

use crate::errors::{Result, TrackError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Zone {
    pub id: String,
    /// The fixed offset, or for a zone with rules the offset at the instant
    /// it was pinned to with [`Zone::at`].
    pub offset: UtcOffset,
    #[serde(skip)]
    rules: Option<Tz>,
}

impl Zone {
    pub fn fixed(id: impl Into<String>, offset: UtcOffset) -> Self {
        Self {
            id: id.into(),
            offset,
            rules: None,
        }
    }

    /// An IANA zone by name, pinned to its offset at `at`.
    pub fn named(name: &str, at: OffsetDateTime) -> Result<Self> {
        let rules: Tz = name
            .parse()
            .map_err(|e| TrackError::ZoneLookup(format!("unknown zone {name}: {e}")))?;
        let zone = Self {
            id: name.to_string(),
            offset: UtcOffset::UTC,
            rules: Some(rules),
        };
        Ok(zone.at(at))
    }

    pub fn utc() -> Self {
        Self::fixed("UTC", UtcOffset::UTC)
    }

    /// The host's zone, or UTC when the local offset cannot be determined.
    pub fn system_default() -> Self {
        match UtcOffset::current_local_offset() {
            Ok(offset) => Self::fixed("Local", offset),
            Err(e) => {
                warn!("Cannot determine local offset ({e}), using UTC");
                Self::utc()
            }
        }
    }

    /// Offset in effect at `time`, following daylight saving when the zone
    /// has rules.
    pub fn offset_at(&self, time: OffsetDateTime) -> UtcOffset {
        let Some(rules) = self.rules else {
            return self.offset;
        };
        let Some(utc) = chrono::DateTime::from_timestamp(time.unix_timestamp(), 0) else {
            return self.offset;
        };
        let seconds = rules
            .offset_from_utc_datetime(&utc.naive_utc())
            .fix()
            .local_minus_utc();
        UtcOffset::from_whole_seconds(seconds).unwrap_or(self.offset)
    }

    /// The same zone with `offset` set to the one in effect at `time`.
    pub fn at(mut self, time: OffsetDateTime) -> Self {
        self.offset = self.offset_at(time);
        self
    }

    pub fn to_local(&self, time: OffsetDateTime) -> OffsetDateTime {
        time.to_offset(self.offset_at(time))
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, m, _) = self.offset.as_hms();
        let sign = if self.offset.is_negative() { '-' } else { '+' };
        write!(f, "{} (UTC{sign}{:02}:{:02})", self.id, h.abs(), m.abs())
    }
}

/// Maps a coordinate to the zone used for local times there.
pub trait ZoneLookup {
    fn zone_for(&self, lat: f64, lon: f64) -> Result<Zone>;
}

fn check_range(lat: f64, lon: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(TrackError::ZoneLookup(format!(
            "coordinate out of range: lat={lat} lon={lon}"
        )));
    }
    Ok(())
}

/// IANA zones from the zone boundary polygons bundled with tzf-rs.
pub struct TzfZones {
    finder: DefaultFinder,
}

impl TzfZones {
    pub fn new() -> Self {
        Self {
            finder: DefaultFinder::new(),
        }
    }
}

impl Default for TzfZones {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneLookup for TzfZones {
    fn zone_for(&self, lat: f64, lon: f64) -> Result<Zone> {
        check_range(lat, lon)?;
        let name = self.finder.get_tz_name(lon, lat);
        if name.is_empty() {
            return Err(TrackError::ZoneLookup(format!(
                "no zone found for lat={lat} lon={lon}"
            )));
        }
        debug!(name, lat, lon, "Found zone");
        Zone::named(name, OffsetDateTime::now_utc())
    }
}

/// Nautical time zones: whole hours by 15 degree longitude bands.
#[derive(Debug, Clone, Copy, Default)]
pub struct NauticalZones;

impl ZoneLookup for NauticalZones {
    fn zone_for(&self, lat: f64, lon: f64) -> Result<Zone> {
        check_range(lat, lon)?;
        let hours = (lon / 15.0).round().clamp(-12.0, 12.0) as i8;
        let offset = UtcOffset::from_hms(hours, 0, 0)
            .map_err(|e| TrackError::ZoneLookup(e.to_string()))?;
        // Etc/GMT ids use inverted signs.
        let id = match hours {
            0 => "Etc/GMT".to_string(),
            h if h > 0 => format!("Etc/GMT-{h}"),
            h => format!("Etc/GMT+{}", -h),
        };
        Ok(Zone::fixed(id, offset))
    }
}

/// Looks up the zone for a position, falling back to the host zone.
/// The flag reports whether the zone came from the coordinates.
pub fn resolve_zone(lookup: &dyn ZoneLookup, lat: f64, lon: f64) -> (Zone, bool) {
    match lookup.zone_for(lat, lon) {
        Ok(zone) => (zone, true),
        Err(e) => {
            warn!("{e}, falling back to the system time zone");
            (Zone::system_default(), false)
        }
    }
}
