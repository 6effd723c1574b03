//! Scripted user input for headless runs
//!
//! One JSON object per line, targets given as CSS selectors:
//!
//! ```text
//! {"at": 0, "action": "move", "x": 40, "y": 60}
//! {"at": 1200, "action": "click", "selector": "#save"}
//! {"at": 1500, "action": "type", "selector": "[name=\"q\"]", "value": "rust"}
//! {"at": 1600, "action": "key", "key": "Enter"}
//! {"at": 2000, "action": "insert", "selector": "#slot", "html": "<p id=\"done\">ok</p>"}
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tiptour::prelude::*;
use tiptour::{Token, Wake, WakeKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    Move { x: f64, y: f64 },
    Click { selector: String },
    Type { selector: String, value: String },
    Key { key: String },
    Focus { selector: String },
    /// Replaces the children of the matched element.
    Insert { selector: String, html: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEvent {
    /// Milliseconds after the script is armed.
    #[serde(default)]
    pub at: Millis,
    #[serde(flatten)]
    pub action: Action,
}

pub fn parse(text: &str) -> Result<Vec<ScriptEvent>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("script line {}", i + 1))
        })
        .collect()
}

/// Replays script events on the page clock.
#[derive(Debug, Default)]
pub struct Script {
    events: Vec<ScriptEvent>,
    pending: Vec<(Token, usize)>,
    applied: usize,
}

impl Script {
    pub fn new(events: Vec<ScriptEvent>) -> Self {
        Self {
            events,
            pending: Vec::new(),
            applied: 0,
        }
    }

    /// Schedules every event relative to the current time.
    pub fn arm(&mut self, page: &mut Page) {
        for (i, event) in self.events.iter().enumerate() {
            let token = page.scheduler_mut().set_timeout(event.at);
            self.pending.push((token, i));
        }
    }

    pub fn applied(&self) -> usize {
        self.applied
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    fn resolve(page: &Page, selector: &str) -> Option<NodeId> {
        match page.document().query_selector(selector) {
            Ok(Some(el)) => Some(el),
            Ok(None) => {
                tracing::warn!("script target {} not found", selector);
                None
            }
            Err(e) => {
                tracing::warn!("script target {}: {}", selector, e);
                None
            }
        }
    }

    fn apply(page: &mut Page, action: &Action) {
        tracing::debug!("script {:?}", action);
        match action {
            Action::Move { x, y } => page.pointer_move(Point::new(*x, *y)),
            Action::Click { selector } => {
                if let Some(el) = Self::resolve(page, selector) {
                    page.click(el);
                }
            }
            Action::Type { selector, value } => {
                if let Some(el) = Self::resolve(page, selector) {
                    page.focus(el);
                    page.set_input_value(el, value);
                }
            }
            Action::Key { key } => page.key_down(key),
            Action::Focus { selector } => {
                if let Some(el) = Self::resolve(page, selector) {
                    page.focus(el);
                }
            }
            Action::Insert { selector, html } => {
                if let Some(el) = Self::resolve(page, selector) {
                    page.document_mut().set_inner_html(el, html);
                }
            }
        }
    }
}

impl Driver for Script {
    fn on_event(&mut self, _page: &mut Page, _event: &HostEvent) {}

    fn on_wake(&mut self, page: &mut Page, wake: &Wake) {
        if wake.kind != WakeKind::Timer {
            return;
        }
        let Some(pos) = self.pending.iter().position(|(t, _)| *t == wake.token) else {
            return;
        };
        let (_, index) = self.pending.remove(pos);
        if let Some(event) = self.events.get(index) {
            Self::apply(page, &event.action);
            self.applied += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_and_skips_comments() {
        let events = parse(
            r##"
            # warm up
            {"at": 10, "action": "move", "x": 1, "y": 2}
            {"action": "click", "selector": "#a"}
            "##,
        )
        .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].at, 10);
        assert_eq!(events[1].at, 0);
        assert_eq!(
            events[1].action,
            Action::Click {
                selector: "#a".into()
            }
        );
    }

    #[test]
    fn bad_line_is_reported_with_its_number() {
        let err = parse("{\"action\": \"click\", \"selector\": \"#a\"}\n{\"action\": \"fly\"}")
            .unwrap_err();
        assert!(format!("{:#}", err).contains("script line 2"));
    }

    #[test]
    fn events_fire_on_the_page_clock() {
        let mut page = Page::headless(Document::from_html(
            r#"<input name="q"><div id="slot"></div>"#,
        ));
        let mut script = Script::new(
            parse(
                r##"{"at": 100, "action": "type", "selector": "[name=\"q\"]", "value": "rust"}
                   {"at": 300, "action": "insert", "selector": "#slot", "html": "<b id=\"late\">x</b>"}"##,
            )
            .unwrap(),
        );
        script.arm(&mut page);

        EventLoop::new().run_for(&mut page, &mut [&mut script], 150);
        let q = page.document().query_selector("[name=\"q\"]").unwrap().unwrap();
        assert_eq!(page.document().value(q), Some("rust"));
        assert!(page.document().get_element_by_id("late").is_none());

        EventLoop::new().run_for(&mut page, &mut [&mut script], 200);
        assert!(page.document().get_element_by_id("late").is_some());
        assert!(script.is_done());
        assert_eq!(script.applied(), 2);
    }
}
