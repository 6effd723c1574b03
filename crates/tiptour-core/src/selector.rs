//! Target selectors: derive a stable description of an element, and find the
//! element again from that description
//!
//! Derivation priority:
//!   data-testid, data-qa, data-test, aria-label, name, role  -> [key="value"]
//!   id                                                       -> #value
//!   otherwise body > tag:nth-of-type(i) > ... plus a text hint
//!
//! Resolution tries the structural `css` first, then the text hint.

use crate::css;
use crate::dom::{Document, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attributes tried in order when describing an element.
pub const STABLE_ATTRIBUTES: [&str; 7] = [
    "data-testid",
    "data-qa",
    "data-test",
    "aria-label",
    "name",
    "role",
    "id",
];

/// Maximum length of the text hint, in characters.
pub const TEXT_HINT_LEN: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Carried through documents but not used for resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<BTreeMap<String, String>>,
}

impl Selector {
    pub fn css(css: &str) -> Self {
        Self {
            css: Some(css.to_string()),
            ..Self::default()
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    /// True when there is something to resolve against.
    pub fn is_usable(&self) -> bool {
        self.css.as_deref().is_some_and(|c| !c.is_empty())
            || self.text.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.css, &self.text) {
            (Some(css), Some(text)) => write!(f, "{} (text {:?})", css, text),
            (Some(css), None) => write!(f, "{}", css),
            (None, Some(text)) => write!(f, "text {:?}", text),
            (None, None) => write!(f, "<empty selector>"),
        }
    }
}

pub fn css_escape(value: &str) -> String {
    css::escape(value)
}

pub fn build_selector(doc: &Document, el: NodeId) -> Selector {
    for key in STABLE_ATTRIBUTES {
        let Some(value) = doc.get_attribute(el, key).filter(|v| !v.is_empty()) else {
            continue;
        };
        let css = if key == "id" {
            format!("#{}", css_escape(&value))
        } else {
            format!("[{}=\"{}\"]", key, css_escape(&value))
        };
        return Selector::css(&css);
    }

    let css = match positional_path(doc, el) {
        Some(path) => path,
        None => tag_with_classes(doc, el),
    };

    let text: String = doc
        .text_content(el)
        .trim()
        .chars()
        .take(TEXT_HINT_LEN)
        .collect();
    let text = text.trim_end().to_string();

    let selector = Selector::css(&css);
    if text.is_empty() {
        selector
    } else {
        selector.with_text(&text)
    }
}

/// `body > tag:nth-of-type(i) > ...`, anchored at body so the path can only
/// match the element it was built from. `None` for body itself or for
/// elements outside body.
fn positional_path(doc: &Document, el: NodeId) -> Option<String> {
    let body = doc.body();
    let mut parts = Vec::new();
    let mut cur = Some(el);
    while let Some(node) = cur {
        if node == body {
            break;
        }
        let tag = doc.tag_name(node)?;
        parts.push(format!("{}:nth-of-type({})", tag, doc.index_of_type(node)));
        cur = doc.parent_element(node);
    }
    if cur != Some(body) || parts.is_empty() {
        return None;
    }
    parts.push("body".to_string());
    parts.reverse();
    Some(parts.join(" > "))
}

fn tag_with_classes(doc: &Document, el: NodeId) -> String {
    let mut css = doc.tag_name(el).unwrap_or("*").to_string();
    for class in doc.class_list(el).iter().take(2) {
        css.push('.');
        css.push_str(&css_escape(class));
    }
    css
}

/// Structural match first; an invalid or unmatched `css` falls through to the
/// text hint. No uniqueness check: the first match wins.
pub fn query_selector_best(doc: &Document, selector: &Selector) -> Option<NodeId> {
    if let Some(css) = selector.css.as_deref().filter(|c| !c.is_empty()) {
        match doc.query_selector(css) {
            Ok(Some(el)) => return Some(el),
            Ok(None) => {}
            Err(e) => tracing::warn!("unusable selector {}: {}", css, e),
        }
    }

    let text = selector.text.as_deref().filter(|t| !t.is_empty())?;
    find_by_text(doc, text)
}

/// Text-contains scan from body in document order, narrowed to the deepest
/// element that still holds the whole of `text`. Body itself matches when
/// the text only appears across several of its children.
fn find_by_text(doc: &Document, text: &str) -> Option<NodeId> {
    let contains = |id: NodeId| doc.text_content(id).contains(text);

    let mut found = doc.body();
    if !contains(found) {
        return None;
    }
    while let Some(child) = doc.children(found).into_iter().find(|c| contains(*c)) {
        found = child;
    }
    Some(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Document {
        Document::from_html(
            r#"<header><button id="submit-btn">Send</button></header>
               <main>
                 <div><p>intro</p></div>
                 <div class="card wide tall">
                   <p>first</p>
                   <p>Second <em>paragraph</em></p>
                   <button data-testid="save">Save</button>
                   <a aria-label="Open settings">gear</a>
                 </div>
               </main>"#,
        )
    }

    #[test]
    fn id_becomes_id_selector() {
        let doc = page();
        let el = doc.get_element_by_id("submit-btn").unwrap();
        let sel = build_selector(&doc, el);
        assert_eq!(sel, Selector::css("#submit-btn"));
    }

    #[test]
    fn priority_attribute_wins_over_id() {
        let doc = Document::from_html(r#"<input id="q" name="query">"#);
        let el = doc.query_selector("input").unwrap().unwrap();
        assert_eq!(build_selector(&doc, el).css.as_deref(), Some(r#"[name="query"]"#));
    }

    #[test]
    fn attribute_values_are_escaped() {
        let doc = page();
        let el = doc.query_selector("a").unwrap().unwrap();
        let sel = build_selector(&doc, el);
        assert_eq!(sel.css.as_deref(), Some(r#"[aria-label="Open\ settings"]"#));
        assert!(sel.text.is_none());
        assert_eq!(query_selector_best(&doc, &sel), Some(el));
    }

    #[test]
    fn positional_path_with_text_hint() {
        let doc = page();
        let el = doc.query_selector("em").unwrap().unwrap();
        let p = doc.parent_element(el).unwrap();
        let sel = build_selector(&doc, p);
        assert_eq!(
            sel.css.as_deref(),
            Some("body > main:nth-of-type(1) > div:nth-of-type(2) > p:nth-of-type(2)")
        );
        assert_eq!(sel.text.as_deref(), Some("Second paragraph"));
    }

    #[test]
    fn text_hint_is_truncated() {
        let long = "x".repeat(100);
        let doc = Document::from_html(&format!("<p>  {}  </p>", long));
        let el = doc.query_selector("p").unwrap().unwrap();
        let sel = build_selector(&doc, el);
        assert_eq!(sel.text.map(|t| t.chars().count()), Some(TEXT_HINT_LEN));
    }

    #[test]
    fn body_falls_back_to_tag_and_classes() {
        let mut doc = Document::new();
        let body = doc.body();
        doc.add_class(body, "a");
        doc.add_class(body, "b");
        doc.add_class(body, "c");
        assert_eq!(build_selector(&doc, body).css.as_deref(), Some("body.a.b"));
    }

    #[test]
    fn round_trip_for_every_element() {
        let doc = page();
        for el in doc.descendants(doc.body()) {
            let sel = build_selector(&doc, el);
            assert_eq!(query_selector_best(&doc, &sel), Some(el), "{}", sel);
        }
    }

    #[test]
    fn text_fallback_when_structure_drifts() {
        let doc = page();
        let sel = Selector::css("#gone").with_text("Second paragraph");
        let found = query_selector_best(&doc, &sel).unwrap();
        assert_eq!(doc.tag_name(found), Some("p"));

        let inner = query_selector_best(&doc, &Selector::text("paragraph")).unwrap();
        assert_eq!(doc.tag_name(inner), Some("em"));
    }

    #[test]
    fn text_spanning_siblings_resolves_to_their_parent() {
        let doc = Document::from_html(
            r#"<nav><a>Home</a></nav><div id="greet"><span>Hello</span><span>World</span></div>"#,
        );
        let greet = doc.get_element_by_id("greet").unwrap();
        assert_eq!(query_selector_best(&doc, &Selector::text("HelloWorld")), Some(greet));

        let doc = Document::from_html("<span>Hello</span><span>World</span>");
        assert_eq!(
            query_selector_best(&doc, &Selector::text("HelloWorld")),
            Some(doc.body())
        );
        assert_eq!(
            doc.tag_name(query_selector_best(&doc, &Selector::text("World")).unwrap()),
            Some("span")
        );
    }

    #[test]
    fn positional_path_is_anchored_at_body() {
        let doc = Document::from_html(
            "<section><div><p>nested</p></div></section><div><p>top</p></div>",
        );
        let top = doc.query_selector("body > div > p").unwrap().unwrap();
        let sel = build_selector(&doc, top);
        assert_eq!(
            sel.css.as_deref(),
            Some("body > div:nth-of-type(1) > p:nth-of-type(1)")
        );
        assert_eq!(query_selector_best(&doc, &sel), Some(top));

        // Without the anchor the nested branch would win in document order.
        let loose = doc.query_selector("div:nth-of-type(1) > p:nth-of-type(1)").unwrap();
        assert_ne!(loose, Some(top));
    }

    #[test]
    fn invalid_css_is_a_miss() {
        let doc = page();
        assert_eq!(query_selector_best(&doc, &Selector::css("div[")), None);
        let sel = Selector::css("div[").with_text("intro");
        assert!(query_selector_best(&doc, &sel).is_some());
    }

    #[test]
    fn nothing_to_resolve() {
        let doc = page();
        assert!(!Selector::default().is_usable());
        assert_eq!(query_selector_best(&doc, &Selector::default()), None);
        assert_eq!(query_selector_best(&doc, &Selector::text("absent")), None);
    }

    #[test]
    fn serializes_without_empty_fields() {
        let json = serde_json::to_string(&Selector::css("#a")).unwrap();
        assert_eq!(json, r##"{"css":"#a"}"##);
    }
}
