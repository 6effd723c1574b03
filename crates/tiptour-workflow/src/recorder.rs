//! Click recorder: turns clicks on button-like controls into `click` steps
//!
//! The recorder is a [`Driver`], so it sees every click the page delivers,
//! including ones other components react to.

use crate::types::{Step, Workflow, VERSION};
use crossbeam_channel::{unbounded, Receiver, Sender};
use tiptour_core::prelude::*;
use tiptour_core::Wake;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
}

#[derive(Debug, Default)]
pub struct Recorder {
    state: RecorderState,
    steps: Vec<Step>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    subscribers: Vec<Sender<Step>>,
}

/// True for `<button>` elements and anything with `role="button"`.
pub fn is_button_like(doc: &Document, el: NodeId) -> bool {
    doc.tag_name(el).is_some_and(|t| t.eq_ignore_ascii_case("button"))
        || doc.get_attribute(el, "role").as_deref() == Some("button")
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears previous steps and begins recording. No-op while recording.
    pub fn start(&mut self) {
        if self.state == RecorderState::Recording {
            return;
        }
        self.steps.clear();
        self.started_at = Some(chrono::Utc::now());
        self.state = RecorderState::Recording;
        tracing::debug!("recording started");
    }

    pub fn stop(&mut self) {
        if self.state == RecorderState::Idle {
            return;
        }
        self.state = RecorderState::Idle;
        tracing::debug!("recording stopped with {} steps", self.steps.len());
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Live feed of recorded steps. Dropped receivers are pruned.
    pub fn subscribe(&mut self) -> Receiver<Step> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Snapshot of the steps recorded so far.
    pub fn get_workflow(&self, id: &str, name: Option<&str>) -> Workflow {
        let mut metadata = serde_json::Map::new();
        if let Some(at) = self.started_at {
            metadata.insert("recordedAt".into(), serde_json::Value::String(at.to_rfc3339()));
        }
        Workflow {
            version: VERSION.to_string(),
            id: id.to_string(),
            name: name.map(str::to_string),
            metadata: (!metadata.is_empty()).then_some(metadata),
            vars: None,
            steps: self.steps.clone(),
        }
    }

    fn record_click(&mut self, doc: &Document, target: NodeId) {
        if !is_button_like(doc, target) {
            tracing::trace!("ignoring click on non-button {:?}", target);
            return;
        }
        let selector = build_selector(doc, target);
        tracing::debug!("recorded click on {}", selector);
        let step = Step::click(selector);
        self.subscribers.retain(|tx| tx.send(step.clone()).is_ok());
        self.steps.push(step);
    }
}

impl Driver for Recorder {
    fn on_event(&mut self, page: &mut Page, event: &HostEvent) {
        if !self.is_recording() {
            return;
        }
        if let HostEvent::Click { target, .. } = event {
            self.record_click(page.document(), *target);
        }
    }

    fn on_wake(&mut self, _page: &mut Page, _wake: &Wake) {}
}
