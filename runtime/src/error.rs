//! Error taxonomy for loading, crawling, and extraction.

use thiserror::Error;

/// Errors produced by the kmlcrawl library.
#[derive(Error, Debug)]
pub enum KmlError {
    /// Bad construction arguments, e.g. both or neither of a local path and a URL.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The resource could not be retrieved: unreachable host, non-2xx status,
    /// or a missing local file.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Malformed XML, or a KMZ archive without a `doc.kml` entry.
    #[error("parse error: {0}")]
    Parse(String),

    /// An attribute lookup for a field that is not present in the table.
    #[error("field not found in attribute table: {0}")]
    MissingField(String),

    /// Temporary storage failure while staging a download.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KmlError {
    pub(crate) fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<quick_xml::Error> for KmlError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<zip::result::ZipError> for KmlError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Parse(format!("malformed archive: {e}"))
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, KmlError>;
