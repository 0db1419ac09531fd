//! A parsed KML document: element tree, root namespace, and link discovery.

use crate::document::tree::{self, Element};
use crate::error::Result;
use crate::extraction::placemark::Placemark;
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

/// A KML document loaded from a single local or remote source.
#[derive(Debug, Clone)]
pub struct KmlDocument {
    root: Element,
    namespace: String,
    location: String,
}

impl KmlDocument {
    /// Parse KML bytes. `location` is the path or URL the bytes came from and
    /// is used to resolve relative `NetworkLink` targets.
    pub fn from_bytes(bytes: &[u8], location: impl Into<String>) -> Result<Self> {
        let root = tree::parse(bytes)?;
        let namespace = root_namespace(root.tag()).to_string();
        let location = location.into();
        debug!("parsed {location} (namespace {namespace:?})");

        Ok(Self {
            root,
            namespace,
            location,
        })
    }

    /// The `{uri}` prefix of the root element, or empty if it has none.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Path or URL this document was loaded from.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Qualify a local element name with this document's namespace.
    pub fn qualified(&self, local: &str) -> String {
        format!("{}{local}", self.namespace)
    }

    /// Target of every `NetworkLink` in the document, in document order.
    ///
    /// `Link/href` is preferred; the deprecated `Url/href` form is the
    /// fallback. A `NetworkLink` with neither is skipped.
    pub fn network_links(&self) -> Vec<String> {
        let link_path = [self.qualified("Link"), self.qualified("href")];
        let url_path = [self.qualified("Url"), self.qualified("href")];
        let link_path: Vec<&str> = link_path.iter().map(String::as_str).collect();
        let url_path: Vec<&str> = url_path.iter().map(String::as_str).collect();

        let mut links = Vec::new();
        for network_link in self.root.find_all(&[self.qualified("NetworkLink").as_str()]) {
            let href = network_link
                .find(&link_path)
                .or_else(|| network_link.find(&url_path))
                .map(|e| e.text().trim())
                .filter(|h| !h.is_empty());

            match href {
                Some(href) => links.push(self.resolve_href(href)),
                None => warn!("NetworkLink without Link/href or Url/href in {}", self.location),
            }
        }
        links
    }

    /// Every `Placemark` element in document order.
    pub fn placemark_elements(&self) -> Vec<&Element> {
        self.root.find_all(&[self.qualified("Placemark").as_str()])
    }

    /// Extract every placemark in this document.
    pub fn placemarks(&self) -> Vec<Placemark> {
        self.placemark_elements()
            .into_iter()
            .map(|e| Placemark::from_element(e, &self.namespace))
            .collect()
    }

    /// Absolute hrefs are kept verbatim. Relative ones resolve against the
    /// document URL, or against the directory of a local document.
    fn resolve_href(&self, href: &str) -> String {
        if Url::parse(href).is_ok() {
            return href.to_string();
        }

        if let Ok(base) = Url::parse(&self.location) {
            return match base.join(href) {
                Ok(joined) => joined.to_string(),
                Err(e) => {
                    warn!("cannot resolve {href} against {}: {e}", self.location);
                    href.to_string()
                }
            };
        }

        match Path::new(&self.location).parent() {
            Some(dir) => dir.join(href).to_string_lossy().into_owned(),
            None => href.to_string(),
        }
    }
}

/// The `{uri}` prefix of a qualified tag, including braces.
pub fn root_namespace(tag: &str) -> &str {
    if !tag.starts_with('{') {
        return "";
    }
    match tag.find('}') {
        Some(end) => &tag[..=end],
        None => "",
    }
}

/// Final `/`-delimited segment of a URL.
///
/// Returns `None` when the URL ends in `/` or has no `/` at all.
pub fn filename_from_url(url: &str) -> Option<&str> {
    if url.ends_with('/') {
        return None;
    }
    url.rsplit_once('/').map(|(_, name)| name)
}
