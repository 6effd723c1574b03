//! The host context handed to every component: document, viewport,
//! scheduler, pending events, outgoing notifications and navigation

use crate::dom::{Document, NodeId};
use crate::event::HostEvent;
use crate::point::Point;
use crate::scheduler::{Millis, Scheduler, TimerQueue};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_VIEWPORT: Viewport = Viewport {
    width: 1280.0,
    height: 800.0,
};

/// Notifications kept until taken; older ones are dropped first.
pub const MAX_NOTIFICATIONS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// A custom event emitted for outside observers, e.g. `tipContentUpdate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub name: String,
    pub detail: serde_json::Value,
}

pub struct Page {
    document: Document,
    viewport: Viewport,
    scheduler: Box<dyn Scheduler>,
    events: VecDeque<HostEvent>,
    notifications: Vec<Notification>,
    url: Option<String>,
    navigation: Option<String>,
}

impl Page {
    pub fn new(document: Document, scheduler: Box<dyn Scheduler>) -> Self {
        Self {
            document,
            viewport: DEFAULT_VIEWPORT,
            scheduler,
            events: VecDeque::new(),
            notifications: Vec::new(),
            url: None,
            navigation: None,
        }
    }

    /// Page on virtual time, for tests and headless playback.
    pub fn headless(document: Document) -> Self {
        Self::new(document, Box::new(TimerQueue::manual()))
    }

    /// Page on wall-clock time.
    pub fn realtime(document: Document) -> Self {
        Self::new(document, Box::new(TimerQueue::system()))
    }

    pub fn with_viewport(mut self, width: f64, height: f64) -> Self {
        self.viewport = Viewport { width, height };
        self
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = Viewport { width, height };
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    // Time

    pub fn now(&self) -> Millis {
        self.scheduler.now()
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    pub fn scheduler_mut(&mut self) -> &mut dyn Scheduler {
        self.scheduler.as_mut()
    }

    // Events

    pub fn dispatch(&mut self, event: HostEvent) {
        self.events.push_back(event);
    }

    pub fn next_event(&mut self) -> Option<HostEvent> {
        self.events.pop_front()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Pointer sample at `p`, targeted at the element under it.
    pub fn pointer_move(&mut self, p: Point) {
        let target = self.document.element_at(p);
        self.dispatch(HostEvent::PointerMove {
            x: p.x,
            y: p.y,
            target,
        });
    }

    /// Pointer sample over a specific element.
    pub fn pointer_over(&mut self, el: NodeId, p: Point) {
        self.dispatch(HostEvent::PointerMove {
            x: p.x,
            y: p.y,
            target: Some(el),
        });
    }

    /// Synthesized click. Ignored for detached nodes.
    pub fn click(&mut self, el: NodeId) {
        if !self.document.is_connected(el) {
            return;
        }
        tracing::debug!("click on {:?}", el);
        let path = self.document.path(el);
        self.dispatch(HostEvent::Click { target: el, path });
    }

    pub fn focus(&mut self, el: NodeId) {
        if !self.document.is_connected(el) {
            return;
        }
        if let Some(prev) = self.document.active_element() {
            if prev == el {
                return;
            }
            self.blur(prev);
        }
        self.document.set_active_element(Some(el));
        self.dispatch(HostEvent::Focus { target: el });
    }

    pub fn blur(&mut self, el: NodeId) {
        if self.document.active_element() != Some(el) {
            return;
        }
        self.document.set_active_element(None);
        self.dispatch(HostEvent::Blur { target: el });
    }

    pub fn set_input_value(&mut self, el: NodeId, value: &str) {
        self.document.set_value(el, value);
        self.dispatch(HostEvent::Input { target: el });
    }

    pub fn key_down(&mut self, key: &str) {
        let target = self.document.active_element();
        self.dispatch(HostEvent::KeyDown {
            target,
            key: key.to_string(),
        });
    }

    // Notifications

    pub fn notify(&mut self, name: &str, detail: serde_json::Value) {
        self.notifications.push(Notification {
            name: name.to_string(),
            detail,
        });
        if self.notifications.len() > MAX_NOTIFICATIONS {
            let excess = self.notifications.len() - MAX_NOTIFICATIONS;
            self.notifications.drain(..excess);
        }
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    // Navigation

    /// Records a full navigation. The current execution context ends: the
    /// event loop stops delivering once this is set.
    pub fn navigate(&mut self, url: &str) {
        tracing::debug!("navigating to {}", url);
        self.navigation = Some(url.to_string());
    }

    pub fn navigation(&self) -> Option<&str> {
        self.navigation.as_deref()
    }

    pub fn has_navigated(&self) -> bool {
        self.navigation.is_some()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("viewport", &self.viewport)
            .field("now", &self.now())
            .field("pending_events", &self.events.len())
            .field("navigation", &self.navigation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Page {
        Page::headless(Document::from_html(
            r#"<form><input id="a"><input id="b"><button>Go</button></form>"#,
        ))
    }

    #[test]
    fn notification_outbox_is_bounded() {
        let mut page = page();
        for i in 0..MAX_NOTIFICATIONS + 10 {
            page.notify("tick", serde_json::json!(i));
        }
        assert_eq!(page.notifications().len(), MAX_NOTIFICATIONS);
        assert_eq!(page.notifications()[0].detail, serde_json::json!(10));

        let taken = page.take_notifications();
        assert_eq!(taken.last().unwrap().detail, serde_json::json!(MAX_NOTIFICATIONS + 9));
        assert!(page.notifications().is_empty());
    }

    #[test]
    fn click_carries_dispatch_path() {
        let mut page = page();
        let button = page.document().query_selector("button").unwrap().unwrap();
        page.click(button);
        match page.next_event() {
            Some(HostEvent::Click { target, path }) => {
                assert_eq!(target, button);
                assert!(path.contains(&page.document().body()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn focus_moves_and_blurs_previous() {
        let mut page = page();
        let a = page.document().get_element_by_id("a").unwrap();
        let b = page.document().get_element_by_id("b").unwrap();
        page.focus(a);
        page.focus(b);
        let kinds: Vec<&str> = std::iter::from_fn(|| page.next_event())
            .map(|e| e.kind())
            .collect();
        assert_eq!(kinds, vec!["focus", "blur", "focus"]);
        assert_eq!(page.document().active_element(), Some(b));
    }

    #[test]
    fn set_input_value_updates_document() {
        let mut page = page();
        let a = page.document().get_element_by_id("a").unwrap();
        page.set_input_value(a, "hello");
        assert_eq!(page.document().value(a), Some("hello"));
        assert_eq!(page.next_event(), Some(HostEvent::Input { target: a }));
    }

    #[test]
    fn detached_click_is_ignored() {
        let mut page = page();
        let button = page.document().query_selector("button").unwrap().unwrap();
        page.document_mut().remove(button);
        page.click(button);
        assert!(!page.has_pending_events());
    }

    #[test]
    fn navigation_is_recorded() {
        let mut page = page();
        assert!(!page.has_navigated());
        page.navigate("https://example.com/next");
        assert_eq!(page.navigation(), Some("https://example.com/next"));
    }
}
