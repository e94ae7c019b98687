//! Serializes documents back to GPX, TCX and the heart-rate session CSV.

use std::fmt::Write as _;

use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::debug;

use crate::errors::Result;
use crate::models::{GpxDocument, Lap, TcxDocument, TrackPoint, Waypoint};
use crate::timezone::{ZoneLookup, resolve_zone};

const GPX_NS: &str = "http://www.topografix.com/GPX/1/1";
const TPX_NS: &str = "http://www.garmin.com/xmlschemas/TrackPointExtension/v2";
const TCX_NS: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
const TCX_EXT_NS: &str = "http://www.garmin.com/xmlschemas/ActivityExtension/v2";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

const XML_TIME: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);
const SESSION_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn xml_time(time: OffsetDateTime) -> Result<String> {
    Ok(time.to_offset(time::UtcOffset::UTC).format(XML_TIME)?)
}

// Writing into a String cannot fail, so the fmt::Result of write! is dropped.
fn element(out: &mut String, indent: usize, name: &str, text: &str) {
    let _ = writeln!(
        out,
        "{:indent$}<{name}>{}</{name}>",
        "",
        escape_xml(text),
        indent = indent
    );
}

fn opt_element(out: &mut String, indent: usize, name: &str, text: Option<&str>) {
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        element(out, indent, name, text);
    }
}

fn gpx_point(out: &mut String, indent: usize, tag: &str, point: &TrackPoint) -> Result<()> {
    let Some(position) = point.position else {
        return Ok(());
    };
    let pad = indent + 2;
    let _ = writeln!(
        out,
        "{:indent$}<{tag} lat=\"{}\" lon=\"{}\">",
        "",
        position.lat,
        position.lon,
        indent = indent
    );
    if let Some(ele) = point.elevation {
        element(out, pad, "ele", &ele.to_string());
    }
    if let Some(time) = point.time {
        element(out, pad, "time", &xml_time(time)?);
    }
    let hr = point.heart_rate_bpm();
    if hr.is_some() || point.cadence.is_some() {
        let _ = writeln!(out, "{:pad$}<extensions>", "", pad = pad);
        let _ = writeln!(out, "{:w$}<gpxtpx:TrackPointExtension>", "", w = pad + 2);
        if let Some(hr) = hr {
            element(out, pad + 4, "gpxtpx:hr", &hr.to_string());
        }
        if let Some(cad) = point.cadence {
            element(out, pad + 4, "gpxtpx:cad", &cad.to_string());
        }
        let _ = writeln!(out, "{:w$}</gpxtpx:TrackPointExtension>", "", w = pad + 2);
        let _ = writeln!(out, "{:pad$}</extensions>", "", pad = pad);
    }
    let _ = writeln!(out, "{:indent$}</{tag}>", "", indent = indent);
    Ok(())
}

fn gpx_waypoint(out: &mut String, indent: usize, tag: &str, wpt: &Waypoint) -> Result<()> {
    let pad = indent + 2;
    let _ = writeln!(
        out,
        "{:indent$}<{tag} lat=\"{}\" lon=\"{}\">",
        "",
        wpt.position.lat,
        wpt.position.lon,
        indent = indent
    );
    if let Some(ele) = wpt.elevation {
        element(out, pad, "ele", &ele.to_string());
    }
    if let Some(time) = wpt.time {
        element(out, pad, "time", &xml_time(time)?);
    }
    opt_element(out, pad, "name", wpt.name.as_deref());
    opt_element(out, pad, "desc", wpt.description.as_deref());
    let _ = writeln!(out, "{:indent$}</{tag}>", "", indent = indent);
    Ok(())
}

/// GPX 1.1 with heart rate and cadence in Garmin TrackPointExtension v2
/// elements. Trackpoints without a position are skipped.
pub fn write_gpx(gpx: &GpxDocument) -> Result<Vec<u8>> {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<gpx version=\"1.1\" creator=\"{}\" xmlns=\"{GPX_NS}\" xmlns:gpxtpx=\"{TPX_NS}\">",
        escape_xml(gpx.creator.as_deref().unwrap_or(crate::CREATOR))
    );

    let meta = &gpx.metadata;
    let has_extensions = meta.category.is_some() || meta.location.is_some();
    if meta.name.is_some() || meta.description.is_some() || meta.author.is_some() || has_extensions
    {
        out.push_str("  <metadata>\n");
        opt_element(&mut out, 4, "name", meta.name.as_deref());
        opt_element(&mut out, 4, "desc", meta.description.as_deref());
        if let Some(author) = meta.author.as_deref() {
            out.push_str("    <author>\n");
            element(&mut out, 6, "name", author);
            out.push_str("    </author>\n");
        }
        if has_extensions {
            out.push_str("    <extensions>\n");
            opt_element(&mut out, 6, "category", meta.category.as_deref());
            opt_element(&mut out, 6, "location", meta.location.as_deref());
            out.push_str("    </extensions>\n");
        }
        out.push_str("  </metadata>\n");
    }

    for wpt in &gpx.waypoints {
        gpx_waypoint(&mut out, 2, "wpt", wpt)?;
    }
    for route in &gpx.routes {
        out.push_str("  <rte>\n");
        opt_element(&mut out, 4, "name", route.name.as_deref());
        for wpt in &route.points {
            gpx_waypoint(&mut out, 4, "rtept", wpt)?;
        }
        out.push_str("  </rte>\n");
    }
    for track in &gpx.tracks {
        out.push_str("  <trk>\n");
        opt_element(&mut out, 4, "name", track.name.as_deref());
        opt_element(&mut out, 4, "desc", track.description.as_deref());
        opt_element(&mut out, 4, "type", meta.category.as_deref());
        for segment in &track.segments {
            out.push_str("    <trkseg>\n");
            for point in &segment.points {
                gpx_point(&mut out, 6, "trkpt", point)?;
            }
            out.push_str("    </trkseg>\n");
        }
        out.push_str("  </trk>\n");
    }
    out.push_str("</gpx>\n");

    debug!(bytes = out.len(), "Wrote GPX");
    Ok(out.into_bytes())
}

fn tcx_sport(sport: Option<&str>) -> &'static str {
    match sport.map(str::to_ascii_lowercase).as_deref() {
        Some("running") | Some("run") => "Running",
        Some("biking") | Some("cycling") | Some("bike") => "Biking",
        _ => "Other",
    }
}

fn tcx_lap(out: &mut String, lap: &Lap) -> Result<()> {
    match lap.start_time {
        Some(start) => {
            let _ = writeln!(out, "      <Lap StartTime=\"{}\">", xml_time(start)?);
        }
        None => out.push_str("      <Lap>\n"),
    }
    element(out, 8, "TotalTimeSeconds", &lap.total_time_seconds.to_string());
    element(out, 8, "DistanceMeters", &lap.distance_meters.to_string());
    if let Some(max) = lap.maximum_speed {
        element(out, 8, "MaximumSpeed", &max.to_string());
    }
    element(out, 8, "Calories", &lap.calories.unwrap_or(0).to_string());
    for (name, value) in [
        ("AverageHeartRateBpm", lap.average_heart_rate),
        ("MaximumHeartRateBpm", lap.maximum_heart_rate),
    ] {
        if let Some(value) = value {
            let _ = writeln!(out, "        <{name}>");
            element(out, 10, "Value", &value.to_string());
            let _ = writeln!(out, "        </{name}>");
        }
    }
    element(out, 8, "Intensity", "Active");
    element(out, 8, "TriggerMethod", "Manual");

    for track in &lap.tracks {
        out.push_str("        <Track>\n");
        for point in &track.points {
            out.push_str("          <Trackpoint>\n");
            if let Some(time) = point.time {
                element(out, 12, "Time", &xml_time(time)?);
            }
            if let Some(position) = point.position {
                out.push_str("            <Position>\n");
                element(out, 14, "LatitudeDegrees", &position.lat.to_string());
                element(out, 14, "LongitudeDegrees", &position.lon.to_string());
                out.push_str("            </Position>\n");
            }
            if let Some(ele) = point.elevation {
                element(out, 12, "AltitudeMeters", &ele.to_string());
            }
            if let Some(distance) = point.distance_meters {
                element(out, 12, "DistanceMeters", &distance.to_string());
            }
            if let Some(hr) = point.heart_rate_bpm() {
                out.push_str("            <HeartRateBpm>\n");
                element(out, 14, "Value", &hr.to_string());
                out.push_str("            </HeartRateBpm>\n");
            }
            if let Some(cad) = point.cadence {
                element(out, 12, "Cadence", &cad.to_string());
            }
            out.push_str("          </Trackpoint>\n");
        }
        out.push_str("        </Track>\n");
    }

    if let Some(avg) = lap.average_speed {
        out.push_str("        <Extensions>\n");
        let _ = writeln!(out, "          <LX xmlns=\"{TCX_EXT_NS}\">");
        element(out, 12, "AvgSpeed", &avg.to_string());
        out.push_str("          </LX>\n");
        out.push_str("        </Extensions>\n");
    }
    out.push_str("      </Lap>\n");
    Ok(())
}

/// Training Center Database v2 with the lap summary fields.
pub fn write_tcx(tcx: &TcxDocument) -> Result<Vec<u8>> {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<TrainingCenterDatabase xmlns=\"{TCX_NS}\" xmlns:xsi=\"{XSI_NS}\">"
    );
    out.push_str("  <Activities>\n");
    for activity in &tcx.activities {
        let _ = writeln!(
            out,
            "    <Activity Sport=\"{}\">",
            tcx_sport(activity.sport.as_deref())
        );
        if let Some(id) = activity.id {
            element(&mut out, 6, "Id", &xml_time(id)?);
        }
        for lap in &activity.laps {
            tcx_lap(&mut out, lap)?;
        }
        opt_element(&mut out, 6, "Notes", activity.notes.as_deref());
        if let Some(creator) = activity.creator.as_deref() {
            out.push_str("      <Creator xsi:type=\"Device_t\">\n");
            element(&mut out, 8, "Name", creator);
            out.push_str("      </Creator>\n");
        }
        out.push_str("    </Activity>\n");
    }
    out.push_str("  </Activities>\n");
    if let Some(author) = tcx.author.as_deref() {
        out.push_str("  <Author xsi:type=\"Application_t\">\n");
        element(&mut out, 4, "Name", author);
        out.push_str("  </Author>\n");
    }
    out.push_str("</TrainingCenterDatabase>\n");

    debug!(bytes = out.len(), "Wrote TCX");
    Ok(out.into_bytes())
}

/// One `time,hr,Invalid` line per trackpoint that has heart rate, time and
/// position. Times are local to the zone of the first such point.
pub fn session_csv(tcx: &TcxDocument, zones: &dyn ZoneLookup) -> Result<String> {
    let mut csv = String::new();
    let mut zone = None;
    for point in tcx.points() {
        let (Some(hr), Some(time), Some(position)) =
            (point.heart_rate_bpm(), point.time, point.position)
        else {
            continue;
        };
        let local = zone
            .get_or_insert_with(|| resolve_zone(zones, position.lat, position.lon).0)
            .to_local(time)
            .format(SESSION_TIME)?;
        let _ = writeln!(csv, "{local},{hr},Invalid");
    }
    Ok(csv)
}
