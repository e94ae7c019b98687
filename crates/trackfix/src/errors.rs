use thiserror::Error;

use crate::file_parsers::FileType;

/// Failure to decode a track file into the document model.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to parse GPX file: {0}")]
    GpxError(String),
    #[error("Failed to parse TCX file: {0}")]
    TcxError(String),
    #[error("Unsupported file type: {0:?}")]
    UnsupportedFileType(FileType),
}

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("No activities found")]
    NoActivities,

    #[error("No trackpoints found")]
    NoTrackPoints,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Interpolation file has only {0} items")]
    RouteTooShort(usize),

    #[error("Did not find a match to the first interpolation point")]
    NoFirstMatch,

    #[error("Did not find a match to the last interpolation point")]
    NoLastMatch,

    #[error("Did not find any trackpoints in the specified interval")]
    NoPointsInWindow,

    #[error("Matched interval has zero duration")]
    ZeroDuration,

    #[error("No non-zero hr or cad values found in TCX")]
    NoSensorData,

    #[error("No trackpoints with timestamps found")]
    NoTimestamps,

    #[error("Cannot convert distance=\"{0}\" to a number")]
    InvalidDistance(String),

    #[error("Invalid units=\"{0}\". Must be ft, mi, m, or km")]
    InvalidUnits(String),

    #[error("Distance must be a positive number, got {0}")]
    NonPositiveDistance(f64),

    #[error("No POIs found in the POI file")]
    NoPois,

    #[error("Out of {total} POIs found none within {radius}")]
    NoPoisFound { total: usize, radius: String },

    #[error("Time zone lookup failed: {0}")]
    ZoneLookup(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot format time: {0}")]
    TimeFormat(#[from] time::error::Format),
}

pub type Result<T> = std::result::Result<T, TrackError>;
