//! Parsed KML documents and the namespace-aware element tree beneath them.

pub mod kml;
pub mod tree;
