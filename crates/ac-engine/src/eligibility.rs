//! Element eligibility filter
//!
//! Decides which element of a page snapshot, if any, is the activation
//! candidate. The checks run in a fixed order (interactive, visible,
//! enabled, in scope, label) and the first element in document order that
//! passes all of them wins.

use std::collections::HashSet;

use ac_core::{Settings, matches_label};
use tracing::warn;

use crate::dom::{Document, Element, ElementId, Viewport};
use crate::selector::SelectorList;

/// An element chosen for activation, with the label text it matched on.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub element: Element,
    pub label: String,
}

/// `button`, `input[type=submit|button]` or anything with `role="button"`.
pub fn is_interactive(el: &Element) -> bool {
    match el.tag.as_str() {
        "button" => true,
        "input" => el
            .attr("type")
            .map(|t| t.trim().eq_ignore_ascii_case("submit") || t.trim().eq_ignore_ascii_case("button"))
            .unwrap_or(false),
        _ => el.attr("role").is_some_and(|r| r.trim().eq_ignore_ascii_case("button")),
    }
}

pub fn is_visible(el: &Element, viewport: &Viewport) -> bool {
    let style = &el.style;
    if style.display.trim() == "none"
        || style.visibility.trim() == "hidden"
        || style.opacity <= 0.0
        || style.pointer_events.trim() == "none"
    {
        return false;
    }

    let rect = &el.rect;
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return false;
    }

    rect.bottom() >= 0.0
        && rect.right() >= 0.0
        && rect.y <= viewport.height
        && rect.x <= viewport.width
}

pub fn is_enabled(el: &Element) -> bool {
    if el.disabled || el.has_attr("disabled") {
        return false;
    }
    !el.attr("aria-disabled")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

/// Text a label is matched against.
pub fn label_text(el: &Element) -> String {
    let aria = || el.attr("aria-label").unwrap_or_default();
    let text = if el.tag == "input" {
        el.value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(aria)
    } else if el.text.trim().is_empty() {
        aria()
    } else {
        el.text.as_str()
    };
    text.trim().to_string()
}

/// Parsed form of the container selector setting
#[derive(Debug, Clone)]
pub enum ContainerScope {
    /// Blank selector: every element is in scope
    Anywhere,
    Selector(SelectorList),
    /// Unparseable selector: no element is in scope
    Invalid,
}

impl ContainerScope {
    pub fn parse(selector: &str) -> Self {
        let selector = selector.trim();
        if selector.is_empty() {
            return Self::Anywhere;
        }
        match SelectorList::parse(selector) {
            Ok(list) => Self::Selector(list),
            Err(e) => {
                warn!(error = %e, "Container selector rejected, nothing is in scope");
                Self::Invalid
            }
        }
    }

    pub fn contains(&self, doc: &Document, el: &Element) -> bool {
        match self {
            Self::Anywhere => true,
            Self::Selector(list) => list.closest(doc, el).is_some(),
            Self::Invalid => false,
        }
    }

    /// Container elements of `doc`, `None` when every element is in scope.
    fn containers(&self, doc: &Document) -> Option<HashSet<ElementId>> {
        match self {
            Self::Anywhere => None,
            Self::Selector(list) => Some(list.matching(doc)),
            Self::Invalid => Some(HashSet::new()),
        }
    }
}

/// First eligible element of `doc` under `settings`.
pub fn find_candidate(doc: &Document, settings: &Settings) -> Option<Candidate> {
    let scope = ContainerScope::parse(&settings.container_selector);
    if matches!(scope, ContainerScope::Invalid) {
        return None;
    }
    let containers = scope.containers(doc);

    doc.elements().iter().find_map(|el| {
        if !is_interactive(el) || !is_visible(el, &doc.viewport) || !is_enabled(el) {
            return None;
        }
        if let Some(containers) = &containers {
            if !doc.ancestors_inclusive(el).any(|a| containers.contains(&a.id)) {
                return None;
            }
        }
        let label = label_text(el);
        matches_label(&label, &settings.activation_labels).then(|| Candidate {
            element: el.clone(),
            label,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ComputedStyle, ElementNode, Rect};

    fn button(label: &str) -> ElementNode {
        ElementNode::new("button")
            .text(label)
            .rect(Rect::new(100.0, 100.0, 120.0, 32.0))
    }

    fn page(children: Vec<ElementNode>) -> Document {
        let form = children
            .into_iter()
            .fold(ElementNode::new("form"), |form, child| form.child(child));
        Document::new(
            "https://example.com/form",
            Viewport::default(),
            ElementNode::new("body").child(form),
        )
    }

    fn settings() -> Settings {
        Settings {
            activation_labels: vec!["Submit".to_string()],
            ..Settings::default()
        }
    }

    fn first(doc: &Document) -> &Element {
        doc.elements().iter().find(|e| e.tag != "body" && e.tag != "form").unwrap()
    }

    #[test]
    fn test_finds_button_with_embedded_label() {
        let doc = page(vec![button("Submit Form")]);
        let candidate = find_candidate(&doc, &settings()).unwrap();
        assert_eq!(candidate.label, "Submit Form");
        assert_eq!(candidate.element.tag, "button");
    }

    #[test]
    fn test_disabled_button_is_not_a_candidate() {
        let doc = page(vec![button("Submit").attr("disabled", "")]);
        assert!(find_candidate(&doc, &settings()).is_none());

        let doc = page(vec![button("Submit").disabled(true)]);
        assert!(find_candidate(&doc, &settings()).is_none());

        let doc = page(vec![button("Submit").attr("aria-disabled", " TRUE ")]);
        assert!(find_candidate(&doc, &settings()).is_none());

        let doc = page(vec![button("Submit").attr("aria-disabled", "false")]);
        assert!(find_candidate(&doc, &settings()).is_some());
    }

    #[test]
    fn test_first_match_in_document_order_wins() {
        let doc = page(vec![
            button("Cancel"),
            button("Submit order").attr("id", "first"),
            button("Submit").attr("id", "second"),
        ]);
        let candidate = find_candidate(&doc, &settings()).unwrap();
        assert_eq!(candidate.element.attr("id"), Some("first"));
    }

    #[test]
    fn test_interactive_recognition() {
        let cases = [
            (ElementNode::new("button"), true),
            (ElementNode::new("input").attr("type", "SUBMIT"), true),
            (ElementNode::new("input").attr("type", "button"), true),
            (ElementNode::new("input").attr("type", "text"), false),
            (ElementNode::new("input"), false),
            (ElementNode::new("div").attr("role", "button"), true),
            (ElementNode::new("a"), false),
        ];
        for (node, expected) in cases {
            let doc = page(vec![node]);
            assert_eq!(is_interactive(first(&doc)), expected);
        }
    }

    #[test]
    fn test_visibility_rules() {
        let vp = Viewport::default();
        let visible = |node: ElementNode| {
            let doc = page(vec![node]);
            is_visible(first(&doc), &vp)
        };

        assert!(visible(button("Submit")));
        assert!(!visible(button("Submit").rect(Rect::new(0.0, 0.0, 0.0, 10.0))));
        assert!(!visible(button("Submit").rect(Rect::new(0.0, -50.0, 10.0, 10.0))));
        assert!(!visible(button("Submit").rect(Rect::new(-50.0, 0.0, 10.0, 10.0))));
        assert!(!visible(button("Submit").rect(Rect::new(0.0, 900.0, 10.0, 10.0))));
        assert!(!visible(button("Submit").rect(Rect::new(1300.0, 0.0, 10.0, 10.0))));
        // Touching the viewport edge counts.
        assert!(visible(button("Submit").rect(Rect::new(0.0, 800.0, 10.0, 10.0))));

        let hidden = [
            ComputedStyle { display: "none".into(), ..ComputedStyle::default() },
            ComputedStyle { visibility: "hidden".into(), ..ComputedStyle::default() },
            ComputedStyle { opacity: 0.0, ..ComputedStyle::default() },
            ComputedStyle { pointer_events: "none".into(), ..ComputedStyle::default() },
        ];
        for style in hidden {
            assert!(!visible(button("Submit").style(style)));
        }
    }

    #[test]
    fn test_label_text_sources() {
        let doc = page(vec![
            ElementNode::new("input").attr("type", "submit").value(" Apply "),
            ElementNode::new("input").attr("type", "submit").attr("aria-label", "Continue"),
            ElementNode::new("button").attr("aria-label", "Yes"),
            ElementNode::new("button").attr("aria-label", "ignored").text("Go"),
        ]);
        let labels: Vec<String> = doc.elements()[2..].iter().map(label_text).collect();
        assert_eq!(labels, vec!["Apply", "Continue", "Yes", "Go"]);
    }

    #[test]
    fn test_container_scope() {
        let outside = Document::new(
            "https://example.com/",
            Viewport::default(),
            ElementNode::new("body").child(button("Submit")),
        );
        let mut settings = settings();
        assert!(find_candidate(&outside, &settings).is_none());

        settings.container_selector = "  ".to_string();
        assert!(find_candidate(&outside, &settings).is_some());

        settings.container_selector = "body".to_string();
        assert!(find_candidate(&outside, &settings).is_some());

        settings.container_selector = "body:not(.checkout)".to_string();
        assert!(find_candidate(&outside, &settings).is_some());
        assert!(ContainerScope::parse("body:not(.checkout)").contains(&outside, &outside.elements()[1]));
    }

    #[test]
    fn test_invalid_container_selector_fails_closed() {
        let doc = page(vec![button("Submit")]);
        let settings = Settings {
            container_selector: "form:no-such-state".to_string(),
            ..settings()
        };
        assert!(matches!(ContainerScope::parse(&settings.container_selector), ContainerScope::Invalid));
        assert!(find_candidate(&doc, &settings).is_none());
    }

    #[test]
    fn test_no_labels_never_match() {
        let doc = page(vec![button("Submit")]);
        let settings = Settings {
            activation_labels: Vec::new(),
            ..Settings::default()
        };
        assert!(find_candidate(&doc, &settings).is_none());
    }
}
