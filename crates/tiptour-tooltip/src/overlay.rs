//! Hover targeting independent of the tooltip: finds the nearest `data-tip`
//! element under the pointer, outlines it, and tells observers about it

use serde::Serialize;
use tiptour_core::prelude::*;
use tiptour_core::Wake;

pub const TIP_ATTRIBUTE: &str = "data-tip";
pub const OVERLAY_ID: &str = "data-tip-overlay";
pub const NOTIFICATION: &str = "tipContentUpdate";
pub const NO_TIP_MESSAGE: &str = "Hmmm, nothing yet";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeInfo {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementInfo {
    pub tag: String,
    pub id: String,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TipContent {
    pub no_tip: bool,
    pub message: String,
    pub element_info: Option<ElementInfo>,
}

impl TipContent {
    pub fn none() -> Self {
        Self {
            no_tip: true,
            message: NO_TIP_MESSAGE.to_string(),
            element_info: None,
        }
    }
}

/// Nearest element at or above `el` carrying `data-tip`, stopping below body.
pub fn find_tip_element(doc: &Document, el: NodeId) -> Option<NodeId> {
    let body = doc.body();
    let mut cur = Some(el);
    while let Some(node) = cur {
        if node == body || !doc.is_element(node) {
            return None;
        }
        if doc.has_attribute(node, TIP_ATTRIBUTE) {
            return Some(node);
        }
        cur = doc.parent_element(node);
    }
    None
}

pub fn element_info(doc: &Document, el: NodeId) -> ElementInfo {
    ElementInfo {
        tag: doc.tag_name(el).unwrap_or_default().to_ascii_uppercase(),
        id: doc.get_attribute(el, "id").unwrap_or_default(),
        classes: doc.class_list(el),
        attributes: doc
            .attributes(el)
            .into_iter()
            .map(|(name, value)| AttributeInfo { name, value })
            .collect(),
    }
}

#[derive(Debug, Default)]
pub struct HoverTracker {
    last: Option<TipContent>,
    tip: Option<NodeId>,
    overlay: Option<NodeId>,
}

impl HoverTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Element currently outlined.
    pub fn current(&self) -> Option<NodeId> {
        self.tip
    }

    pub fn last_content(&self) -> Option<&TipContent> {
        self.last.as_ref()
    }

    fn handle_pointer(&mut self, page: &mut Page, target: Option<NodeId>) {
        let found = target.and_then(|t| find_tip_element(page.document(), t));

        // Leaving the outlined element removes its overlay.
        if let Some(tip) = self.tip {
            let inside = target.is_some_and(|t| page.document().contains(tip, t));
            if !inside {
                self.remove_overlay(page);
            }
        }

        let content = match found {
            None => TipContent::none(),
            Some(el) => {
                let doc = page.document();
                TipContent {
                    no_tip: false,
                    message: doc.get_attribute(el, TIP_ATTRIBUTE).unwrap_or_default(),
                    element_info: Some(element_info(doc, el)),
                }
            }
        };
        self.publish(page, content);

        if let Some(el) = found {
            self.outline(page, el);
        }
    }

    fn publish(&mut self, page: &mut Page, content: TipContent) {
        if self.last.as_ref() == Some(&content) {
            return;
        }
        match serde_json::to_value(&content) {
            Ok(detail) => page.notify(NOTIFICATION, detail),
            Err(e) => tracing::warn!("could not encode tip content: {}", e),
        }
        self.last = Some(content);
    }

    /// Replaces any existing overlay with one covering `el`.
    fn outline(&mut self, page: &mut Page, el: NodeId) {
        let doc = page.document_mut();
        if let Some(existing) = doc.get_element_by_id(OVERLAY_ID) {
            doc.remove(existing);
        }
        let rect = doc.rect(el).unwrap_or_default();
        let overlay = doc.create_element("div");
        doc.set_attribute(overlay, "id", OVERLAY_ID);
        for (prop, value) in [
            ("position", "absolute".to_string()),
            ("border", "2px solid red".to_string()),
            ("pointer-events", "none".to_string()),
            ("box-sizing", "border-box".to_string()),
            ("z-index", "999".to_string()),
            ("width", format!("{}px", rect.width)),
            ("height", format!("{}px", rect.height)),
            ("top", format!("{}px", rect.y)),
            ("left", format!("{}px", rect.x)),
        ] {
            doc.set_style(overlay, prop, &value);
        }
        let body = doc.body();
        if doc.append_child(body, overlay).is_ok() {
            doc.set_rect(overlay, rect);
            self.overlay = Some(overlay);
            self.tip = Some(el);
        }
    }

    fn remove_overlay(&mut self, page: &mut Page) {
        if let Some(overlay) = self.overlay.take() {
            page.document_mut().remove(overlay);
        }
        self.tip = None;
    }
}

impl Driver for HoverTracker {
    fn on_event(&mut self, page: &mut Page, event: &HostEvent) {
        if let HostEvent::PointerMove { target, .. } = event {
            self.handle_pointer(page, *target);
        }
    }

    fn on_wake(&mut self, _page: &mut Page, _wake: &Wake) {}
}
