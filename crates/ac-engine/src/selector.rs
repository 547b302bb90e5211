//! Container selectors
//!
//! Selectors are parsed and matched by `scraper`. A page snapshot is mirrored
//! into an HTML tree with every element tagged by its document index, so
//! matches map back to [`ElementId`]s of the snapshot.

use std::collections::HashSet;
use std::fmt;

use scraper::{Html, Selector};

use crate::dom::{Document, Element, ElementId};
use crate::error::{EngineError, Result};

/// Attribute carrying the snapshot index in the mirrored tree
const NODE_ATTR: &str = "data-ac-node";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

/// Parsed comma-separated selector list
#[derive(Debug, Clone)]
pub struct SelectorList {
    source: String,
    selector: Selector,
}

impl SelectorList {
    pub fn parse(source: &str) -> Result<Self> {
        let selector = Selector::parse(source).map_err(|e| EngineError::InvalidSelector {
            selector: source.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            selector,
        })
    }

    /// Every element of `doc` matching the list.
    pub fn matching(&self, doc: &Document) -> HashSet<ElementId> {
        let html = Html::parse_document(&mirror_html(doc));
        html.select(&self.selector)
            .filter_map(|el| el.value().attr(NODE_ATTR))
            .filter_map(|id| id.parse().ok())
            .collect()
    }

    /// True if `el` itself matches any selector in the list.
    pub fn matches(&self, doc: &Document, el: &Element) -> bool {
        self.matching(doc).contains(&el.id)
    }

    /// Nearest inclusive ancestor of `el` matching the list.
    pub fn closest<'a>(&self, doc: &'a Document, el: &'a Element) -> Option<&'a Element> {
        let matched = self.matching(doc);
        doc.ancestors_inclusive(el).find(|candidate| matched.contains(&candidate.id))
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Serialize the element structure of `doc` (no text) as a standards-mode document.
fn mirror_html(doc: &Document) -> String {
    let mut html = String::from("<!DOCTYPE html>");
    let mut open: Vec<(ElementId, &str)> = Vec::new();

    for el in doc.elements() {
        while let Some(&(id, tag)) = open.last() {
            if el.parent == Some(id) {
                break;
            }
            close_tag(&mut html, tag);
            open.pop();
        }

        let tag = if is_markup_name(&el.tag) { el.tag.as_str() } else { "div" };
        html.push_str(&format!("<{} {}=\"{}\"", tag, NODE_ATTR, el.id));
        for (name, value) in &el.attributes {
            if name != NODE_ATTR && is_markup_name(name) {
                html.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
            }
        }
        html.push('>');
        open.push((el.id, tag));
    }

    while let Some((_, tag)) = open.pop() {
        close_tag(&mut html, tag);
    }
    html
}

fn close_tag(html: &mut String, tag: &str) {
    if !VOID_ELEMENTS.contains(&tag) {
        html.push_str(&format!("</{}>", tag));
    }
}

fn is_markup_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
