//! In-memory document: an arena of element and text nodes
//!
//! Node ids are never reused. Removing a node detaches it from the tree, after
//! which the id still resolves but [`Document::is_connected`] reports `false`
//! and geometry lookups return `None`. Holders of ids (arrow targets, player
//! waits) therefore behave like weak references into a live page.

use crate::css::SelectorList;
use crate::error::{Error, Result};
use crate::html::{self, HtmlNode};
use crate::point::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    style: BTreeMap<String, String>,
    value: String,
    rect: Rect,
}

#[derive(Debug, Clone)]
enum NodeData {
    Root,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    html: NodeId,
    head: NodeId,
    body: NodeId,
    active: Option<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document with `html > (head, body)`.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: vec![Node {
                data: NodeData::Root,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
            html: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            active: None,
        };
        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.attach(doc.root, html);
        doc.attach(html, head);
        doc.attach(html, body);
        doc.html = html;
        doc.head = head;
        doc.body = body;
        doc
    }

    /// Loads a page. `html`/`head`/`body` wrappers are unwrapped into the
    /// document's own; anything else lands in `body`.
    pub fn from_html(src: &str) -> Self {
        let mut doc = Self::new();
        let nodes = html::parse_fragment(src);
        doc.load_nodes(nodes);
        doc
    }

    fn load_nodes(&mut self, nodes: Vec<HtmlNode>) {
        for node in nodes {
            let tag = node.tag().map(str::to_string);
            match (tag.as_deref(), node) {
                (Some("html"), HtmlNode::Element { attrs, children, .. }) => {
                    self.copy_attrs(self.html, attrs);
                    self.load_nodes(children);
                }
                (Some(t @ ("head" | "body")), HtmlNode::Element { attrs, children, .. }) => {
                    let target = if t == "head" { self.head } else { self.body };
                    self.copy_attrs(target, attrs);
                    self.append_html_nodes(target, children);
                }
                (_, HtmlNode::Text(text)) if text.trim().is_empty() => {}
                (_, other) => self.append_html_nodes(self.body, vec![other]),
            }
        }
    }

    fn copy_attrs(&mut self, id: NodeId, attrs: Vec<(String, String)>) {
        for (name, value) in attrs {
            self.set_attribute(id, &name, &value);
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn document_element(&self) -> NodeId {
        self.html
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id)?.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.0)?.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    // Construction

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            style: BTreeMap::new(),
            value: String::new(),
            rect: Rect::default(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Appends `child` to `parent`, moving it if it is already in the tree.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.node(parent).is_none() || self.node(child).is_none() {
            return Err(Error::node_not_found("append target"));
        }
        if matches!(self.nodes[parent.0].data, NodeData::Text(_)) {
            return Err(Error::invalid_document("text nodes cannot have children"));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(Error::invalid_document("cannot append a node into itself"));
        }
        self.detach(child);
        self.attach(parent, child);
        Ok(())
    }

    /// Detaches a node and its subtree. Safe on already detached nodes.
    pub fn remove(&mut self, id: NodeId) {
        if self.node(id).is_none() || id == self.root {
            return;
        }
        if let Some(active) = self.active {
            if active == id || self.is_ancestor(id, active) {
                self.active = None;
            }
        }
        self.detach(id);
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    pub fn remove_children(&mut self, id: NodeId) {
        for child in self.children_nodes(id) {
            self.remove(child);
        }
    }

    fn append_html_nodes(&mut self, parent: NodeId, nodes: Vec<HtmlNode>) {
        for node in nodes {
            let child = match node {
                HtmlNode::Text(t) => self.create_text(&t),
                HtmlNode::Element {
                    tag,
                    attrs,
                    children,
                } => {
                    let el = self.create_element(&tag);
                    self.copy_attrs(el, attrs);
                    if tag == "input" || tag == "textarea" {
                        let initial = self.get_attribute(el, "value").unwrap_or_default();
                        if let Some(e) = self.element_mut(el) {
                            e.value = initial;
                        }
                    }
                    self.append_html_nodes(el, children);
                    el
                }
            };
            self.attach(parent, child);
        }
    }

    // Tree navigation

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Parent only if it is an element (not the document root).
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    fn children_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    /// Element children, skipping text.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|n| {
                n.children
                    .iter()
                    .copied()
                    .filter(|c| self.is_element(*c))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.parent(p);
        }
        false
    }

    pub fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
        ancestor == id || self.is_ancestor(ancestor, id)
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        id == self.root || (self.node(id).is_some() && self.is_ancestor(self.root, id))
    }

    /// Dispatch path from `id` up to and including the root, like `composedPath()`.
    pub fn path(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            out.push(p);
            cur = self.parent(p);
        }
        out
    }

    /// Connected elements in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_elements(self.root, &mut out);
        out
    }

    /// Element descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for child in self.children(id) {
            self.collect_elements(child, &mut out);
        }
        out
    }

    fn collect_elements(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if self.is_element(id) {
            out.push(id);
        }
        if let Some(node) = self.node(id) {
            for child in &node.children {
                self.collect_elements(*child, out);
            }
        }
    }

    /// 1-based position among siblings sharing the same tag.
    pub fn index_of_type(&self, id: NodeId) -> usize {
        let Some(tag) = self.tag_name(id) else {
            return 1;
        };
        let Some(parent) = self.parent(id) else {
            return 1;
        };
        self.children(parent)
            .into_iter()
            .filter(|c| self.tag_name(*c) == Some(tag))
            .position(|c| c == id)
            .map(|i| i + 1)
            .unwrap_or(1)
    }

    /// 1-based position among element siblings.
    pub fn index_in_parent(&self, id: NodeId) -> usize {
        self.parent(id)
            .and_then(|p| self.children(p).into_iter().position(|c| c == id))
            .map(|i| i + 1)
            .unwrap_or(1)
    }

    pub fn sibling_count(&self, id: NodeId) -> usize {
        self.parent(id).map(|p| self.children(p).len()).unwrap_or(1)
    }

    pub fn same_type_sibling_count(&self, id: NodeId) -> usize {
        let Some(tag) = self.tag_name(id) else {
            return 1;
        };
        self.parent(id)
            .map(|p| {
                self.children(p)
                    .into_iter()
                    .filter(|c| self.tag_name(*c) == Some(tag))
                    .count()
            })
            .unwrap_or(1)
    }

    // Element data

    /// Lowercase tag name.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.element(id)?
            .attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.get_attribute(id, name).is_some()
    }

    pub fn attributes(&self, id: NodeId) -> Vec<(String, String)> {
        self.element(id).map(|e| e.attrs.clone()).unwrap_or_default()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if let Some(e) = self.element_mut(id) {
            match e.attrs.iter_mut().find(|(n, _)| *n == name) {
                Some((_, v)) => *v = value.to_string(),
                None => e.attrs.push((name, value.to_string())),
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        if let Some(e) = self.element_mut(id) {
            e.attrs.retain(|(n, _)| *n != name);
        }
    }

    pub fn id_attr(&self, id: NodeId) -> Option<String> {
        self.get_attribute(id, "id").filter(|v| !v.is_empty())
    }

    pub fn class_list(&self, id: NodeId) -> Vec<String> {
        self.get_attribute(id, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.class_list(id).iter().any(|c| c == class)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        let mut classes = self.class_list(id);
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
            self.set_attribute(id, "class", &classes.join(" "));
        }
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        let classes = self.class_list(id);
        if classes.iter().any(|c| c == class) {
            let kept: Vec<String> = classes.into_iter().filter(|c| c != class).collect();
            self.set_attribute(id, "class", &kept.join(" "));
        }
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<String> {
        self.element(id)?.style.get(property).cloned()
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) {
        if let Some(e) = self.element_mut(id) {
            if value.is_empty() {
                e.style.remove(property);
            } else {
                e.style.insert(property.to_string(), value.to_string());
            }
        }
    }

    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.value.as_str())
    }

    pub fn set_value(&mut self, id: NodeId, value: &str) {
        if let Some(e) = self.element_mut(id) {
            e.value = value.to_string();
        }
    }

    /// Bounding rect, `None` for text or detached nodes.
    pub fn rect(&self, id: NodeId) -> Option<Rect> {
        if !self.is_connected(id) {
            return None;
        }
        self.element(id).map(|e| e.rect)
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        if let Some(e) = self.element_mut(id) {
            e.rect = rect;
        }
    }

    // Text and markup

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else { return };
        match &node.data {
            NodeData::Text(t) => out.push_str(t),
            NodeData::Element(e) if e.tag == "script" || e.tag == "style" => {}
            _ => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if !self.is_element(id) {
            return;
        }
        self.remove_children(id);
        if !text.is_empty() {
            let t = self.create_text(text);
            self.attach(id, t);
        }
    }

    /// Replaces the children of `id` with parsed markup. The markup is taken
    /// as given; callers wanting sanitization go through [`html::sanitize`].
    pub fn set_inner_html(&mut self, id: NodeId, markup: &str) {
        if !self.is_element(id) {
            return;
        }
        self.remove_children(id);
        self.append_html_nodes(id, html::parse_fragment(markup));
    }

    pub fn append_html(&mut self, id: NodeId, nodes: Vec<HtmlNode>) {
        if self.is_element(id) {
            self.append_html_nodes(id, nodes);
        }
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        html::serialize(&self.to_html_nodes(id))
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        match self.to_html_node(id) {
            Some(node) => html::serialize(&[node]),
            None => String::new(),
        }
    }

    fn to_html_nodes(&self, id: NodeId) -> Vec<HtmlNode> {
        self.children_nodes(id)
            .into_iter()
            .filter_map(|c| self.to_html_node(c))
            .collect()
    }

    fn to_html_node(&self, id: NodeId) -> Option<HtmlNode> {
        match &self.node(id)?.data {
            NodeData::Text(t) => Some(HtmlNode::Text(t.clone())),
            NodeData::Element(e) => Some(HtmlNode::Element {
                tag: e.tag.clone(),
                attrs: e.attrs.clone(),
                children: self.to_html_nodes(id),
            }),
            NodeData::Root => None,
        }
    }

    // Queries

    pub fn query_selector(&self, css: &str) -> Result<Option<NodeId>> {
        let list = SelectorList::parse(css)?;
        Ok(self.elements().into_iter().find(|el| list.matches(self, *el)))
    }

    pub fn query_selector_all(&self, css: &str) -> Result<Vec<NodeId>> {
        let list = SelectorList::parse(css)?;
        Ok(self
            .elements()
            .into_iter()
            .filter(|el| list.matches(self, *el))
            .collect())
    }

    pub fn get_element_by_id(&self, value: &str) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|el| self.get_attribute(*el, "id").as_deref() == Some(value))
    }

    /// Innermost connected element whose rect contains `p`, topmost in
    /// document order.
    pub fn element_at(&self, p: Point) -> Option<NodeId> {
        self.descendants(self.body)
            .into_iter()
            .rev()
            .find(|el| self.rect(*el).map(|r| r.width > 0.0 && r.contains(p)).unwrap_or(false))
    }

    // Focus

    pub fn active_element(&self) -> Option<NodeId> {
        self.active.filter(|a| self.is_connected(*a))
    }

    pub fn set_active_element(&mut self, id: Option<NodeId>) {
        self.active = id.filter(|a| self.is_connected(*a));
    }
}
