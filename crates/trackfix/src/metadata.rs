//! Activity metadata recovered from file names and creator strings.

use std::fmt;
use std::path::Path;

use serde::Serialize;

/// Which application or device produced a file, judged from its creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Source {
    Polar,
    #[serde(rename = "STL")]
    SportsTrackLive,
    #[serde(rename = "GPX Inspector")]
    GpxInspector,
    GpsLink,
    MapSource,
    Other,
    #[serde(rename = "NA")]
    Unknown,
}

impl Source {
    pub fn from_creator(creator: Option<&str>) -> Self {
        let Some(creator) = creator.filter(|c| !c.is_empty()) else {
            return Source::Unknown;
        };
        let creator = creator.to_lowercase();
        if creator.contains("polar") {
            Source::Polar
        } else if creator.contains("sportstracklive") {
            Source::SportsTrackLive
        } else if creator.contains("gpx inspector") {
            Source::GpxInspector
        } else if creator.contains("gpslink") {
            Source::GpsLink
        } else if creator.contains("mapsource") {
            Source::MapSource
        } else {
            Source::Other
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Polar => "Polar",
            Source::SportsTrackLive => "STL",
            Source::GpxInspector => "GPX Inspector",
            Source::GpsLink => "GpsLink",
            Source::MapSource => "MapSource",
            Source::Other => "Other",
            Source::Unknown => "NA",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMetadata {
    pub category: Option<String>,
    pub location: Option<String>,
}

/// File stem up to the first dot.
fn base_name(file_name: &str) -> Option<&str> {
    let stem = Path::new(file_name).file_name()?.to_str()?;
    stem.split('.').next()
}

/// Category and location encoded in a file name.
///
/// SportsTrackLive names look like `a-b-c-Category-Location-More-x`. Other
/// names look like `First_Last_2019-03-08_10-57-52_Category_Location_More`,
/// where the category follows the time token and the rest is the location.
/// Fields already known (`existing`) are never overwritten.
pub fn metadata_from_file_name(
    file_name: &str,
    source: Source,
    existing: &NameMetadata,
) -> NameMetadata {
    let mut result = existing.clone();
    let Some(name) = base_name(file_name).filter(|n| !n.is_empty()) else {
        return result;
    };

    if source == Source::SportsTrackLive && existing.category.is_none() && existing.location.is_none()
    {
        let tokens: Vec<&str> = name.split('-').collect();
        if tokens.len() < 6 {
            result.category = Some("STL".to_string());
            result.location = Some("STL".to_string());
        } else {
            result.category = Some(tokens[3].to_string());
            result.location = Some(tokens[4..tokens.len() - 1].join(" "));
        }
        return result;
    }

    let tokens: Vec<&str> = name.split('_').collect();
    if tokens.len() < 4 {
        return result;
    }
    let mut dashed = tokens
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, t)| t.split('-').count() == 3)
        .map(|(i, _)| i);
    let (Some(_date), Some(time)) = (dashed.next(), dashed.next()) else {
        return result;
    };
    if time + 2 >= tokens.len() {
        return result;
    }

    if result.category.is_none() {
        result.category = Some(tokens[time + 1].to_string());
    }
    if result.location.is_none() {
        result.location = Some(tokens[time + 2..].join(" "));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_creator() {
        assert_eq!(Source::from_creator(None), Source::Unknown);
        assert_eq!(Source::from_creator(Some("")), Source::Unknown);
        assert_eq!(Source::from_creator(Some("Polar Flow")), Source::Polar);
        assert_eq!(
            Source::from_creator(Some("http://www.SportsTrackLive.com")),
            Source::SportsTrackLive
        );
        assert_eq!(Source::from_creator(Some("Garmin Connect")), Source::Other);
        assert_eq!(Source::SportsTrackLive.to_string(), "STL");
    }

    #[test]
    fn test_underscore_names() {
        let meta = metadata_from_file_name(
            "/data/Kenneth_Evans_2019-03-08_10-57-52_Walking_Kensington_Metro_Park.gpx",
            Source::Other,
            &NameMetadata::default(),
        );
        assert_eq!(meta.category.as_deref(), Some("Walking"));
        assert_eq!(meta.location.as_deref(), Some("Kensington Metro Park"));
    }

    #[test]
    fn test_underscore_names_keep_existing() {
        let existing = NameMetadata {
            category: Some("Biking".to_string()),
            location: None,
        };
        let meta = metadata_from_file_name(
            "Kenneth_Evans_2019-03-08_10-57-52_Walking_Kensington.tcx",
            Source::Polar,
            &existing,
        );
        assert_eq!(meta.category.as_deref(), Some("Biking"));
        assert_eq!(meta.location.as_deref(), Some("Kensington"));
    }

    #[test]
    fn test_underscore_names_without_time() {
        let meta = metadata_from_file_name(
            "some_random_file_name.gpx",
            Source::Other,
            &NameMetadata::default(),
        );
        assert_eq!(meta, NameMetadata::default());

        // Time token is too close to the end
        let meta = metadata_from_file_name(
            "A_B_2019-03-08_10-57-52_Walking.gpx",
            Source::Other,
            &NameMetadata::default(),
        );
        assert_eq!(meta, NameMetadata::default());
    }

    #[test]
    fn test_sportstracklive_names() {
        let meta = metadata_from_file_name(
            "kenevans-2019-03-Walking-Kensington-Metro-Park-123.gpx",
            Source::SportsTrackLive,
            &NameMetadata::default(),
        );
        assert_eq!(meta.category.as_deref(), Some("Walking"));
        assert_eq!(meta.location.as_deref(), Some("Kensington Metro Park"));

        let meta = metadata_from_file_name(
            "short-name.gpx",
            Source::SportsTrackLive,
            &NameMetadata::default(),
        );
        assert_eq!(meta.category.as_deref(), Some("STL"));
        assert_eq!(meta.location.as_deref(), Some("STL"));
    }
}
