//! In-place repair of GPX files written by Polar tools: missing category and
//! location metadata, and trackpoint times recorded as local wall-clock time
//! without an offset.

use std::fmt;

use time::UtcOffset;
use tracing::{info, warn};

use crate::metadata::{NameMetadata, Source, metadata_from_file_name};
use crate::models::GpxDocument;
use crate::timezone::{ZoneLookup, resolve_zone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedItem {
    Location,
    Category,
    Time,
    /// Times lacked an offset but no position was available to find the zone.
    TimeFailed,
}

impl fmt::Display for FixedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FixedItem::Location => "Location",
            FixedItem::Category => "Category",
            FixedItem::Time => "Time",
            FixedItem::TimeFailed => "Time(Failed)",
        })
    }
}

/// What [`fix_gpx_metadata`] changed, in the order it was changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixReport {
    pub fixed: Vec<FixedItem>,
}

impl FixReport {
    pub fn is_modified(&self) -> bool {
        !self.fixed.is_empty()
    }
}

impl fmt::Display for FixReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fixed.is_empty() {
            return f.write_str("Unmodified");
        }
        f.write_str("Fixed:")?;
        for item in &self.fixed {
            write!(f, " {item}")?;
        }
        Ok(())
    }
}

/// Fills missing category and location from the file-name conventions and
/// moves offset-less trackpoint times from local wall-clock time to UTC.
///
/// The zone comes from the first positioned trackpoint and is applied with
/// its daylight-saving rules at each point's time.
pub fn fix_gpx_metadata(
    gpx: &mut GpxDocument,
    file_name: Option<&str>,
    zones: &dyn ZoneLookup,
) -> FixReport {
    let mut report = FixReport::default();

    if let Some(name) = file_name {
        let existing = NameMetadata {
            category: gpx.metadata.category.clone(),
            location: gpx.metadata.location.clone(),
        };
        let source = Source::from_creator(gpx.creator.as_deref());
        let derived = metadata_from_file_name(name, source, &existing);

        let usable = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        let meta = &mut gpx.metadata;
        if meta.location.is_none() && usable(&derived.location) {
            meta.location = derived.location;
            report.fixed.push(FixedItem::Location);
        }
        if meta.category.is_none() && usable(&derived.category) {
            meta.category = derived.category;
            report.fixed.push(FixedItem::Category);
        }
    }

    if gpx.unzoned_times {
        let start = gpx.track_points().find_map(|p| p.position);
        match start {
            Some(position) => {
                let (zone, _) = resolve_zone(zones, position.lat, position.lon);
                let mut repaired = 0usize;
                for point in gpx.track_points_mut() {
                    if let Some(time) = point.time {
                        // The stored UTC clock is the local wall clock.
                        point.time = Some(
                            time.replace_offset(zone.offset_at(time))
                                .to_offset(UtcOffset::UTC),
                        );
                        repaired += 1;
                    }
                }
                gpx.unzoned_times = false;
                info!(zone = %zone, repaired, "Moved trackpoint times to UTC");
                report.fixed.push(FixedItem::Time);
            }
            None => {
                warn!("Trackpoint times lack an offset but no trackpoint has a position");
                report.fixed.push(FixedItem::TimeFailed);
            }
        }
    }

    info!(%report, "Checked GPX metadata");
    report
}
