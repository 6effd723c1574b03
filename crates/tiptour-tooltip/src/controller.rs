//! Tooltip controller: a DOM-attached tooltip that follows the smoothed
//! pointer while visible
//!
//! Lifecycle is `hidden <-> visible`; the frame loop runs only while visible.
//! Pointer samples are not queued: the controller keeps the latest one and
//! each frame consumes it.

use crate::arrow::{self, ArrowPose, ARROW_CLASS, ARROW_SVG_CLASS};
use crate::config::TooltipConfig;
use serde::Serialize;
use tiptour_core::html;
use tiptour_core::prelude::*;
use tiptour_core::scheduler::{Token, Wake, WakeKind};

pub const MESSAGE_CLASS: &str = "tiptour-message";
pub const VISIBLE_CLASS: &str = "visible";
pub const DIVIDER_CLASS: &str = "tiptour-divider";
pub const INPUT_CLASS: &str = "tiptour-input";
pub const LOADING_MARKUP: &str = r#"<div class="tiptour-loading">Loading...</div>"#;
pub const DEFAULT_PLACEHOLDER: &str = "Type here...";

/// Minimum distance kept between the tooltip and the viewport edge.
const VIEWPORT_INSET: f64 = 10.0;
/// Minimum time between two `on_update` callbacks.
const UPDATE_THROTTLE_MS: Millis = 16;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TooltipState {
    pub visible: bool,
    pub x: f64,
    pub y: f64,
    pub content: String,
    pub is_loading: bool,
}

/// Arrow targets given either as selectors, resolved once against the
/// document, or as element references.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrowTargets {
    Selectors(Vec<String>),
    Elements(Vec<NodeId>),
}

impl From<Vec<String>> for ArrowTargets {
    fn from(v: Vec<String>) -> Self {
        ArrowTargets::Selectors(v)
    }
}

impl From<&[&str]> for ArrowTargets {
    fn from(v: &[&str]) -> Self {
        ArrowTargets::Selectors(v.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<NodeId>> for ArrowTargets {
    fn from(v: Vec<NodeId>) -> Self {
        ArrowTargets::Elements(v)
    }
}

#[derive(Default)]
struct Callbacks {
    on_show: Option<Box<dyn FnMut()>>,
    on_hide: Option<Box<dyn FnMut()>>,
    on_update: Option<Box<dyn FnMut(Point)>>,
}

struct InputField {
    node: NodeId,
    on_submit: Box<dyn FnMut(String)>,
}

struct ArrowNodes {
    container: NodeId,
    svg: Option<NodeId>,
}

pub struct TooltipController {
    config: TooltipConfig,
    cursor: SmoothCursor,
    state: TooltipState,

    tooltip: NodeId,
    message: NodeId,
    input: Option<InputField>,
    arrow: Option<ArrowNodes>,
    arrow_targets: Vec<NodeId>,
    arrow_pose: Option<ArrowPose>,

    frame: Option<Token>,
    show_timer: Option<Token>,
    hide_timer: Option<Token>,
    last_sample: Option<Point>,
    last_update_at: Option<Millis>,

    listening: bool,
    destroyed: bool,
    callbacks: Callbacks,
}

impl TooltipController {
    /// Attaches a tooltip to the page body.
    pub fn new(page: &mut Page, config: TooltipConfig) -> Result<Self> {
        let body = page.document().body();
        Self::attach(page, config, body)
    }

    /// Attaches a tooltip to `container`, which must be a connected element.
    pub fn attach(page: &mut Page, config: TooltipConfig, container: NodeId) -> Result<Self> {
        let doc = page.document_mut();
        if !doc.is_element(container) || !doc.is_connected(container) {
            return Err(Error::environment("tooltip container is not attached to the document")
                .with_context(serde_json::json!({ "container": container })));
        }

        let tooltip = doc.create_element("div");
        doc.set_attribute(tooltip, "class", &config.class_name);
        doc.set_style(tooltip, "z-index", &config.z_index.to_string());
        let message = doc.create_element("div");
        doc.set_attribute(message, "class", MESSAGE_CLASS);
        doc.append_child(tooltip, message)?;
        doc.append_child(container, tooltip)?;

        let cursor = SmoothCursor::new(CursorConfig {
            radius: config.smooth_radius,
            friction: config.friction,
            enabled: config.enabled,
            initial_point: config.initial_point,
        });

        let mut controller = Self {
            state: TooltipState {
                x: config.initial_point.x,
                y: config.initial_point.y,
                ..TooltipState::default()
            },
            cursor,
            tooltip,
            message,
            input: None,
            arrow: None,
            arrow_targets: Vec::new(),
            arrow_pose: None,
            frame: None,
            show_timer: None,
            hide_timer: None,
            last_sample: None,
            last_update_at: None,
            listening: config.enabled,
            destroyed: false,
            callbacks: Callbacks::default(),
            config,
        };
        if controller.config.arrow.enabled {
            controller.create_arrow(page);
        }
        tracing::debug!("tooltip attached as {:?}", tooltip);
        Ok(controller)
    }

    // Callbacks

    pub fn on_show(&mut self, f: impl FnMut() + 'static) {
        self.callbacks.on_show = Some(Box::new(f));
    }

    pub fn on_hide(&mut self, f: impl FnMut() + 'static) {
        self.callbacks.on_hide = Some(Box::new(f));
    }

    /// Called with the smooth position, at most once per 16 ms.
    pub fn on_update(&mut self, f: impl FnMut(Point) + 'static) {
        self.callbacks.on_update = Some(Box::new(f));
    }

    // Accessors

    pub fn state(&self) -> &TooltipState {
        &self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state.visible
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn is_enabled(&self) -> bool {
        self.listening
    }

    pub fn config(&self) -> &TooltipConfig {
        &self.config
    }

    pub fn smooth_cursor(&self) -> &SmoothCursor {
        &self.cursor
    }

    pub fn element(&self) -> NodeId {
        self.tooltip
    }

    pub fn message_element(&self) -> NodeId {
        self.message
    }

    pub fn input_element(&self) -> Option<NodeId> {
        self.input.as_ref().map(|i| i.node)
    }

    pub fn arrow_element(&self) -> Option<NodeId> {
        self.arrow.as_ref().map(|a| a.container)
    }

    pub fn arrow_targets(&self) -> &[NodeId] {
        &self.arrow_targets
    }

    pub fn arrow_pose(&self) -> Option<&ArrowPose> {
        self.arrow_pose.as_ref()
    }

    pub fn is_animating(&self) -> bool {
        self.frame.is_some()
    }

    fn input_focused(&self, page: &Page) -> bool {
        match &self.input {
            Some(input) => page.document().active_element() == Some(input.node),
            None => false,
        }
    }

    // Enable / show / hide

    pub fn enable(&mut self) {
        if self.destroyed {
            return;
        }
        self.cursor.enable();
        self.listening = true;
        self.config.enabled = true;
    }

    /// Stops listening to the pointer and hides.
    pub fn disable(&mut self, page: &mut Page) {
        self.cursor.disable();
        self.listening = false;
        self.config.enabled = false;
        self.hide(page);
    }

    pub fn show(&mut self, page: &mut Page) {
        if self.destroyed || self.state.visible {
            return;
        }
        self.state.visible = true;
        page.document_mut().add_class(self.tooltip, VISIBLE_CLASS);
        if self.frame.is_none() {
            self.frame = Some(page.scheduler_mut().request_frame());
        }
        tracing::debug!("tooltip shown");
        if let Some(f) = self.callbacks.on_show.as_mut() {
            f();
        }
    }

    /// No-op while the inline input has focus.
    pub fn hide(&mut self, page: &mut Page) {
        if self.input_focused(page) {
            tracing::trace!("hide refused, input focused");
            return;
        }
        if !self.state.visible {
            return;
        }
        self.state.visible = false;
        page.document_mut().remove_class(self.tooltip, VISIBLE_CLASS);
        self.stop_frames(page);
        tracing::debug!("tooltip hidden");
        if let Some(f) = self.callbacks.on_hide.as_mut() {
            f();
        }
    }

    fn stop_frames(&mut self, page: &mut Page) {
        if let Some(token) = self.frame.take() {
            page.scheduler_mut().cancel(token);
        }
    }

    fn schedule_hide(&mut self, page: &mut Page) {
        self.cancel_hide(page);
        self.hide_timer = Some(page.scheduler_mut().set_timeout(self.config.hide_delay_ms));
    }

    fn cancel_hide(&mut self, page: &mut Page) {
        if let Some(token) = self.hide_timer.take() {
            page.scheduler_mut().cancel(token);
        }
    }

    // Pointer and frames

    /// One raw pointer sample. Debounces the deferred show and hide.
    pub fn handle_pointer(&mut self, page: &mut Page, sample: Point) {
        if !self.listening || self.destroyed {
            return;
        }
        self.last_sample = Some(sample);

        if let Some(token) = self.show_timer.take() {
            page.scheduler_mut().cancel(token);
        }
        if !self.state.visible {
            self.show_timer = Some(page.scheduler_mut().set_timeout(self.config.show_delay_ms));
        }

        if self.input_focused(page) {
            self.cancel_hide(page);
        } else {
            self.schedule_hide(page);
        }
    }

    fn on_frame(&mut self, page: &mut Page) {
        self.frame = None;
        if !self.state.visible || self.destroyed {
            return;
        }
        if let Some(sample) = self.last_sample {
            if self.cursor.update(sample, UpdateOptions::default()) {
                let p = self.cursor.smooth_position();
                self.state.x = p.x;
                self.state.y = p.y;
                self.place(page);
                self.update_arrow(page);

                let now = page.now();
                let due = self
                    .last_update_at
                    .map_or(true, |last| now.saturating_sub(last) >= UPDATE_THROTTLE_MS);
                if due {
                    self.last_update_at = Some(now);
                    if let Some(f) = self.callbacks.on_update.as_mut() {
                        f(p);
                    }
                }
            }
        }
        self.frame = Some(page.scheduler_mut().request_frame());
    }

    /// Puts the box at `position + offset`, flipped to the other side on an
    /// axis that would overflow, and kept inside the viewport inset.
    fn place(&mut self, page: &mut Page) {
        let viewport = page.viewport();
        let offset = self.config.offset;
        let (width, height) = self.box_size(page.document());

        let mut left = self.state.x + offset.x;
        let mut top = self.state.y + offset.y;
        if left + width > viewport.width {
            left = self.state.x - width - offset.x;
        }
        if top + height > viewport.height {
            top = self.state.y - height - offset.y;
        }
        left = left.max(VIEWPORT_INSET);
        top = top.max(VIEWPORT_INSET);

        let doc = page.document_mut();
        doc.set_style(self.tooltip, "transform", &format!("translate({}px, {}px)", left, top));
        doc.set_rect(self.tooltip, Rect::new(left, top, width, height));
        tracing::trace!(left, top, "tooltip placed");
    }

    fn box_size(&self, doc: &Document) -> (f64, f64) {
        match doc.rect(self.tooltip) {
            Some(r) if r.width > 0.0 && r.height > 0.0 => (r.width, r.height),
            _ => (self.config.width, self.config.height),
        }
    }

    /// Position of the tooltip box as last placed.
    pub fn placement(&self, page: &Page) -> Option<Rect> {
        page.document().rect(self.tooltip).filter(|r| r.width > 0.0)
    }

    // Arrow

    fn create_arrow(&mut self, page: &mut Page) {
        if self.arrow.is_some() {
            return;
        }
        let doc = page.document_mut();
        let container = doc.create_element("div");
        doc.set_attribute(container, "class", ARROW_CLASS);
        doc.set_inner_html(
            container,
            &arrow::markup(&self.config.arrow.color, self.config.arrow.size),
        );
        if doc.append_child(self.tooltip, container).is_err() {
            return;
        }
        let svg = doc
            .descendants(container)
            .into_iter()
            .find(|el| doc.has_class(*el, ARROW_SVG_CLASS));
        self.arrow = Some(ArrowNodes { container, svg });
    }

    /// Sets the arrow targets, enabling the arrow if needed. Selectors that
    /// match nothing are dropped.
    pub fn add_arrow(&mut self, page: &mut Page, targets: impl Into<ArrowTargets>) {
        if self.destroyed {
            return;
        }
        if !self.config.arrow.enabled {
            self.config.arrow.enabled = true;
        }
        self.create_arrow(page);

        self.arrow_targets = match targets.into() {
            ArrowTargets::Elements(els) => els,
            ArrowTargets::Selectors(selectors) => selectors
                .iter()
                .filter_map(|s| match page.document().query_selector(s) {
                    Ok(found) => found,
                    Err(e) => {
                        tracing::warn!("dropping arrow target {}: {}", s, e);
                        None
                    }
                })
                .collect(),
        };
        self.arrow_pose = None;
        self.update_arrow(page);
    }

    fn update_arrow(&mut self, page: &mut Page) {
        if !self.config.arrow.enabled || self.arrow_targets.is_empty() {
            return;
        }
        let Some(svg) = self.arrow.as_ref().and_then(|a| a.svg) else {
            return;
        };
        let Some(placed) = self.placement(page) else {
            return;
        };
        let Some(pose) = arrow::pose_towards(page.document(), placed.center(), &self.arrow_targets)
        else {
            return;
        };
        page.document_mut().set_style(svg, "transform", &pose.transform());
        self.arrow_pose = Some(pose);
    }

    // Content

    /// Replaces the body with sanitized markup.
    pub fn set_content(&mut self, page: &mut Page, content: &str) {
        if self.destroyed {
            return;
        }
        self.state.content = content.to_string();
        self.state.is_loading = false;
        let mut nodes = html::parse_fragment(content);
        html::sanitize(&mut nodes);
        let doc = page.document_mut();
        doc.remove_children(self.message);
        doc.append_html(self.message, nodes);
    }

    /// Replaces the body with plain text.
    pub fn set_message(&mut self, page: &mut Page, text: &str) {
        if self.destroyed {
            return;
        }
        self.state.content = text.to_string();
        self.state.is_loading = false;
        page.document_mut().set_text_content(self.message, text);
    }

    pub fn set_loading(&mut self, page: &mut Page, loading: bool) {
        self.state.is_loading = loading;
        if loading && !self.destroyed {
            page.document_mut().set_inner_html(self.message, LOADING_MARKUP);
        }
    }

    // Input

    /// Appends a divider and a text input. A second call is a no-op.
    pub fn add_input(
        &mut self,
        page: &mut Page,
        placeholder: &str,
        on_submit: impl FnMut(String) + 'static,
    ) {
        if self.input.is_some() || self.destroyed {
            return;
        }
        let doc = page.document_mut();
        let divider = doc.create_element("div");
        doc.set_attribute(divider, "class", DIVIDER_CLASS);
        let input = doc.create_element("input");
        doc.set_attribute(input, "type", "text");
        doc.set_attribute(input, "class", INPUT_CLASS);
        doc.set_attribute(input, "placeholder", placeholder);
        if doc.append_child(self.tooltip, divider).is_err()
            || doc.append_child(self.tooltip, input).is_err()
        {
            return;
        }
        self.input = Some(InputField {
            node: input,
            on_submit: Box::new(on_submit),
        });
    }

    fn handle_input_event(&mut self, page: &mut Page, event: &HostEvent) {
        let Some(node) = self.input.as_ref().map(|i| i.node) else {
            return;
        };
        match event {
            HostEvent::KeyDown { target, key } if *target == Some(node) && key == "Enter" => {
                let value = page.document().value(node).unwrap_or_default().trim().to_string();
                if value.is_empty() {
                    return;
                }
                if let Some(input) = self.input.as_mut() {
                    (input.on_submit)(value);
                }
                page.document_mut().set_value(node, "");
            }
            HostEvent::Focus { target } if *target == node => self.cancel_hide(page),
            HostEvent::Blur { target } if *target == node => {
                let empty = page.document().value(node).unwrap_or_default().trim().is_empty();
                if empty {
                    self.schedule_hide(page);
                }
            }
            _ => {}
        }
    }

    // Tuning

    pub fn set_friction(&mut self, friction: f64) {
        self.cursor.set_friction(friction);
        self.config.friction = self.cursor.friction();
    }

    pub fn set_smooth_radius(&mut self, radius: f64) {
        self.cursor.set_radius(radius);
        self.config.smooth_radius = self.cursor.radius();
    }

    pub fn reset(&mut self, point: Option<Point>) {
        self.cursor.reset(point);
        if let Some(p) = point {
            self.state.x = p.x;
            self.state.y = p.y;
        }
    }

    /// Stops listening, removes the tooltip and cancels every pending
    /// timer and frame. Safe to call more than once.
    pub fn destroy(&mut self, page: &mut Page) {
        if self.destroyed {
            return;
        }
        self.disable(page);
        self.stop_frames(page);
        if let Some(token) = self.show_timer.take() {
            page.scheduler_mut().cancel(token);
        }
        self.cancel_hide(page);
        page.document_mut().remove(self.tooltip);
        self.state.visible = false;
        self.destroyed = true;
        self.last_sample = None;
        tracing::debug!("tooltip destroyed");
    }
}

impl Driver for TooltipController {
    fn on_event(&mut self, page: &mut Page, event: &HostEvent) {
        if self.destroyed {
            return;
        }
        match event {
            HostEvent::PointerMove { x, y, .. } => self.handle_pointer(page, Point::new(*x, *y)),
            _ => self.handle_input_event(page, event),
        }
    }

    fn on_wake(&mut self, page: &mut Page, wake: &Wake) {
        let token = Some(wake.token);
        match wake.kind {
            WakeKind::Frame if token == self.frame => self.on_frame(page),
            WakeKind::Timer if token == self.show_timer => {
                self.show_timer = None;
                self.show(page);
            }
            WakeKind::Timer if token == self.hide_timer => {
                self.hide_timer = None;
                self.hide(page);
            }
            _ => {}
        }
    }
}

impl std::fmt::Debug for TooltipController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TooltipController")
            .field("state", &self.state)
            .field("tooltip", &self.tooltip)
            .field("listening", &self.listening)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
