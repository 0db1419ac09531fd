//! Placemark extraction: coordinates and the embedded HTML attribute table.
//!
//! Descriptions in the wild are HTML fragments inside a KML text node, so all
//! field extraction here is pattern matching over text rather than DOM work.

use crate::document::tree::Element;
use crate::error::{KmlError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static COORDINATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(-?[0-9]{1,3}\.[0-9]+),(-?[0-9]{1,3}\.[0-9]+)").unwrap());

// Greedy: first `<table` through the last `/table>`, swallowing any tables in between.
static TABLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)(<table.*/table>)").unwrap());

static ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<td[^>]*>([^<]*)</td>\s*<td[^>]*>(.*?)</td>").unwrap()
});

/// A geocoded record extracted from one `Placemark` element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Placemark {
    /// First number of the coordinate pair (0.0 when none was found).
    pub latitude: f64,
    /// Second number of the coordinate pair (0.0 when none was found).
    pub longitude: f64,
    /// Whether a coordinate pair was actually found.
    pub located: bool,
    /// Raw HTML table span from the description, if any.
    pub description: Option<String>,
    /// Text of the placemark's `<name>` child.
    pub name: Option<String>,
}

impl Placemark {
    /// Extract a placemark from its element, querying children with `namespace`.
    pub fn from_element(element: &Element, namespace: &str) -> Self {
        let coordinates = element
            .find(&[format!("{namespace}coordinates").as_str()])
            .and_then(|c| extract_coordinates(c.text()));
        let description = element
            .find(&[format!("{namespace}description").as_str()])
            .and_then(|d| extract_attribute_table(d.text()));
        let name = element
            .child(&format!("{namespace}name"))
            .map(|n| n.text().trim().to_string())
            .filter(|n| !n.is_empty());

        let (latitude, longitude) = coordinates.unwrap_or((0.0, 0.0));
        Self {
            latitude,
            longitude,
            located: coordinates.is_some(),
            description,
            name,
        }
    }

    /// Look up a field in this placemark's attribute table.
    pub fn attribute(&self, field: &str) -> Result<String> {
        let description = self
            .description
            .as_deref()
            .ok_or_else(|| KmlError::MissingField(field.to_string()))?;
        get_attribute(description, field)
    }

    /// Every key/value row of this placemark's attribute table.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.description.as_deref().map(attribute_pairs).unwrap_or_default()
    }
}

/// First `lat,lon` pair in the text, in the order written.
///
/// The first number is reported as latitude even though KML itself orders
/// coordinates longitude-first; existing consumers rely on this ordering.
pub fn extract_coordinates(text: &str) -> Option<(f64, f64)> {
    let caps = COORDINATE_RE.captures(text)?;
    let first = caps[1].parse().ok()?;
    let second = caps[2].parse().ok()?;
    Some((first, second))
}

/// Span from the first `<table` to the last `/table>` in a description.
pub fn extract_attribute_table(text: &str) -> Option<String> {
    TABLE_RE.find(text).map(|m| m.as_str().to_string())
}

/// Value cell that follows the cell holding `field` verbatim.
pub fn get_attribute(table: &str, field: &str) -> Result<String> {
    let pattern = format!(r"(?s){}</td><td.*?>(.*?)</td>", regex::escape(field));
    let re = Regex::new(&pattern).map_err(|e| KmlError::InvalidArgument(e.to_string()))?;

    re.captures(table)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| KmlError::MissingField(field.to_string()))
}

/// Every two-cell `<td>key</td><td>value</td>` row, in table order.
pub fn attribute_pairs(table: &str) -> Vec<(String, String)> {
    ROW_RE
        .captures_iter(table)
        .map(|caps| (caps[1].trim().to_string(), caps[2].trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
