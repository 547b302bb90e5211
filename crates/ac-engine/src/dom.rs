//! Element tree model
//!
//! A host-independent snapshot of a page: elements in document order with
//! the rendered properties the eligibility filter needs (computed style,
//! bounding box, enablement). Pages are described as a nested
//! [`ElementNode`] tree and flattened into a [`Document`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Index of an element in its document (document order)
pub type ElementId = usize;

/// Subset of the computed style relevant to visibility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    pub pointer_events: String,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            pointer_events: "auto".to_string(),
        }
    }
}

/// Bounding client rect in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

/// Nested description of an element and its subtree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementNode {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Text rendered directly by this node (children add their own)
    pub text: Option<String>,
    /// Current value of form controls
    pub value: Option<String>,
    /// `disabled` DOM property
    pub disabled: bool,
    pub style: ComputedStyle,
    pub rect: Rect,
    pub children: Vec<ElementNode>,
}

impl ElementNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }

    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn child(mut self, child: ElementNode) -> Self {
        self.children.push(child);
        self
    }
}

/// One element of a flattened document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub id: ElementId,
    pub parent: Option<ElementId>,
    /// Lower-cased tag name
    pub tag: String,
    /// Attributes with lower-cased names
    pub attributes: BTreeMap<String, String>,
    /// Rendered inner text, including descendants
    pub text: String,
    pub value: Option<String>,
    pub disabled: bool,
    pub style: ComputedStyle,
    pub rect: Rect,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }
}

/// Page snapshot in document order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub url: String,
    pub viewport: Viewport,
    elements: Vec<Element>,
}

impl Document {
    /// Flatten `root` (pre-order) into a document.
    pub fn new(url: impl Into<String>, viewport: Viewport, root: ElementNode) -> Self {
        let mut elements = Vec::new();
        flatten(root, None, &mut elements);
        Self {
            url: url.into(),
            viewport,
            elements,
        }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id)
    }

    pub fn parent(&self, element: &Element) -> Option<&Element> {
        element.parent.and_then(|id| self.get(id))
    }

    /// The element itself followed by its ancestors, innermost first.
    pub fn ancestors_inclusive<'a>(&'a self, element: &'a Element) -> impl Iterator<Item = &'a Element> + 'a {
        std::iter::successors(Some(element), move |el| self.parent(el))
    }

    /// First element whose `id` attribute equals `id`.
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|el| el.attr("id") == Some(id))
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|el| el.attr("id") == Some(id))
    }
}

/// Returns the element's inner text.
fn flatten(node: ElementNode, parent: Option<ElementId>, out: &mut Vec<Element>) -> String {
    let id = out.len();
    out.push(Element {
        id,
        parent,
        tag: node.tag.to_lowercase(),
        attributes: node
            .attributes
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect(),
        text: String::new(),
        value: node.value,
        disabled: node.disabled,
        style: node.style,
        rect: node.rect,
    });

    let mut parts: Vec<String> = node.text.into_iter().collect();
    for child in node.children {
        let child_text = flatten(child, Some(id), out);
        if !child_text.is_empty() {
            parts.push(child_text);
        }
    }

    let text = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    out[id].text = text.clone();
    text
}

/// On-disk page description used by the host and tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFixture {
    pub url: String,
    #[serde(default)]
    pub viewport: Viewport,
    pub root: ElementNode,
}

impl PageFixture {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let fixture: PageFixture = serde_json::from_str(content)?;
        if fixture.url.trim().is_empty() {
            return Err(EngineError::Fixture("page url is empty".to_string()));
        }
        Ok(fixture)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn into_document(self) -> Document {
        Document::new(self.url, self.viewport, self.root)
    }
}
