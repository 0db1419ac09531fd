//! Placemark extraction.
//!
//! Pulls a coordinate pair and the embedded HTML attribute table out of each
//! `Placemark`, with lenient pattern matching over the description text.

pub mod placemark;
