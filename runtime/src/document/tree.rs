//! Namespace-aware element tree built from `quick_xml` events.
//!
//! Tags are stored in qualified `{namespace-uri}LocalName` form so that a
//! document's root namespace can be prepended to every query. Only the text
//! that precedes an element's first child is kept, mirroring how KML tools
//! read `<coordinates>` and `<description>` content.

use crate::error::{KmlError, Result};
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

/// A single XML element and its subtree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    tag: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// Qualified tag, e.g. `{http://www.opengis.net/kml/2.2}Placemark`.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Tag with any `{uri}` prefix removed.
    pub fn local_name(&self) -> &str {
        match self.tag.rfind('}') {
            Some(idx) => &self.tag[idx + 1..],
            None => &self.tag,
        }
    }

    /// Text content before the first child element (CDATA included).
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Pre-order iterator over every element below this one.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![self.children.iter()],
        }
    }

    /// Find elements along a qualified path.
    ///
    /// The first step matches any descendant; each later step matches direct
    /// children of the previous step's matches. `["a", "b"]` is the
    /// equivalent of the path expression `.//a/b`. Results are in document order.
    pub fn find_all<'a>(&'a self, path: &[&str]) -> Vec<&'a Element> {
        let Some((first, rest)) = path.split_first() else {
            return Vec::new();
        };

        let mut matches: Vec<&Element> = self.descendants().filter(|e| e.tag == *first).collect();
        for step in rest {
            matches = matches
                .into_iter()
                .flat_map(|e| e.children.iter().filter(|c| c.tag == *step))
                .collect();
        }
        matches
    }

    /// First element along a qualified path, see [`Element::find_all`].
    pub fn find(&self, path: &[&str]) -> Option<&Element> {
        self.find_all(path).into_iter().next()
    }

    /// First direct child with the given qualified tag.
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }
}

/// Iterator returned by [`Element::descendants`].
pub struct Descendants<'a> {
    stack: Vec<std::slice::Iter<'a, Element>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(element) => {
                    self.stack.push(element.children.iter());
                    return Some(element);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Parse XML bytes into an element tree, returning the root element.
pub fn parse(bytes: &[u8]) -> Result<Element> {
    let mut reader = NsReader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_resolved_event_into(&mut buf) {
            Ok((resolved, Event::Start(ref e))) => {
                let tag = qualify(resolved, e.local_name().as_ref())?;
                stack.push(Element {
                    tag,
                    ..Element::default()
                });
            }
            Ok((resolved, Event::Empty(ref e))) => {
                let tag = qualify(resolved, e.local_name().as_ref())?;
                let element = Element {
                    tag,
                    ..Element::default()
                };
                attach(&mut stack, &mut root, element)?;
            }
            Ok((_, Event::End(_))) => {
                // End-name mismatches are rejected by the reader itself.
                let element = stack
                    .pop()
                    .ok_or_else(|| KmlError::Parse("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok((_, Event::Text(ref e))) => {
                if let Some(current) = stack.last_mut() {
                    if current.children.is_empty() {
                        let text = e.unescape().map_err(|e| KmlError::Parse(e.to_string()))?;
                        current.text.push_str(&text);
                    }
                }
            }
            Ok((_, Event::CData(ref e))) => {
                if let Some(current) = stack.last_mut() {
                    if current.children.is_empty() {
                        current.text.push_str(&String::from_utf8_lossy(e));
                    }
                }
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => {}
            Err(e) => return Err(KmlError::Parse(format!("malformed XML: {e}"))),
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(KmlError::Parse(format!(
            "unexpected end of document inside <{}>",
            open.local_name()
        )));
    }

    root.ok_or_else(|| KmlError::Parse("document has no root element".to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(KmlError::Parse(
                "multiple root elements in document".to_string(),
            ))
        }
    }
    Ok(())
}

fn qualify(resolved: ResolveResult<'_>, local: &[u8]) -> Result<String> {
    let local = std::str::from_utf8(local)
        .map_err(|e| KmlError::Parse(format!("invalid UTF-8 in tag name: {e}")))?;

    match resolved {
        ResolveResult::Bound(ns) => Ok(format!(
            "{{{}}}{local}",
            String::from_utf8_lossy(ns.as_ref())
        )),
        ResolveResult::Unbound => Ok(local.to_string()),
        ResolveResult::Unknown(prefix) => Err(KmlError::Parse(format!(
            "unbound namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}
