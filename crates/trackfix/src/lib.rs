pub mod config;
pub mod convert;
pub mod edit;
pub mod errors;
pub mod file_parsers;
pub mod geodesy;
pub mod interpolation;
pub mod metadata;
pub mod models;
pub mod proximity;
pub mod recalc;
pub mod repair;
pub mod series;
pub mod stream;
pub mod summary;
pub mod sync;
pub mod timezone;
pub mod units;
pub mod writer;

use std::path::Path;

use bytes::Bytes;
use tracing::info;

use crate::{
    errors::{Result, TrackError},
    file_parsers::{FileType, parse_document},
    models::{Document, GpxDocument, TcxDocument},
};

/// Creator string stamped on documents this crate writes.
pub const CREATOR: &str = concat!("trackfix ", env!("CARGO_PKG_VERSION"));

/// Reads and parses a GPX or TCX file, using the extension and falling back
/// to sniffing the content.
pub fn load_document(path: &Path) -> Result<Document> {
    let bytes = Bytes::from(std::fs::read(path)?);
    let document = parse_document(FileType::from_path(path), bytes)?;
    info!(path = %path.display(), "Loaded document");
    Ok(document)
}

pub fn load_gpx(path: &Path) -> Result<GpxDocument> {
    match load_document(path)? {
        Document::Gpx(gpx) => Ok(gpx),
        Document::Tcx(_) => Err(TrackError::InvalidInput(format!(
            "{} is a TCX file, expected GPX",
            path.display()
        ))),
    }
}

pub fn load_tcx(path: &Path) -> Result<TcxDocument> {
    match load_document(path)? {
        Document::Tcx(tcx) => Ok(tcx),
        Document::Gpx(_) => Err(TrackError::InvalidInput(format!(
            "{} is a GPX file, expected TCX",
            path.display()
        ))),
    }
}
