//! Workflow document schema
//!
//! ```json
//! {"version": "1.0", "id": "signup", "steps": [
//!   {"type": "message", "ui": {"content": "Welcome"}},
//!   {"type": "click", "selector": {"css": "#start"}},
//!   {"type": "input", "selector": {"css": "[name=\"email\"]"}, "payload": {"value": "a@b.c"}},
//!   {"type": "waitFor", "selector": {"text": "Check your inbox"}, "timeout": 5000},
//!   {"type": "navigate", "payload": {"url": "https://example.com/next"}}
//! ]}
//! ```

use crate::error::{Result, WorkflowError};
use crate::validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tiptour_core::{Millis, Selector};

pub const VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepType {
    Message,
    Click,
    Input,
    WaitFor,
    Navigate,
}

impl StepType {
    pub const ALL: [StepType; 5] = [
        StepType::Message,
        StepType::Click,
        StepType::Input,
        StepType::WaitFor,
        StepType::Navigate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepType::Message => "message",
            StepType::Click => "click",
            StepType::Input => "input",
            StepType::WaitFor => "waitFor",
            StepType::Navigate => "navigate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn requires_selector(self) -> bool {
        matches!(self, StepType::Click | StepType::Input | StepType::WaitFor)
    }

    /// Tooltip text used when a step carries no `ui.content`.
    pub fn default_content(self) -> &'static str {
        match self {
            StepType::Message => "Follow the instructions",
            StepType::Click => "Click the highlighted element",
            StepType::Input => "Enter the required value",
            StepType::WaitFor => "Waiting for the element to appear",
            StepType::Navigate => "Navigating to the page",
        }
    }
}

/// `guide` waits for the user to act; `auto` performs the action itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Guide,
    Auto,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepUi {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// CSS selectors the arrow points at instead of the step's own target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrow: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: StepType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Selector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<StepPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<StepUi>,
    /// Milliseconds, `waitFor` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Millis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

impl Step {
    fn new(kind: StepType) -> Self {
        Self {
            id: None,
            kind,
            selector: None,
            payload: None,
            ui: None,
            timeout: None,
            mode: None,
        }
    }

    pub fn message(content: &str) -> Self {
        Self::new(StepType::Message).with_content(content)
    }

    pub fn click(selector: Selector) -> Self {
        Self {
            selector: Some(selector),
            ..Self::new(StepType::Click)
        }
    }

    pub fn input(selector: Selector, value: &str) -> Self {
        Self {
            selector: Some(selector),
            payload: Some(StepPayload {
                value: Some(value.to_string()),
                url: None,
            }),
            ..Self::new(StepType::Input)
        }
    }

    pub fn wait_for(selector: Selector, timeout: Option<Millis>) -> Self {
        Self {
            selector: Some(selector),
            timeout,
            ..Self::new(StepType::WaitFor)
        }
    }

    pub fn navigate(url: &str) -> Self {
        Self {
            payload: Some(StepPayload {
                value: None,
                url: Some(url.to_string()),
            }),
            ..Self::new(StepType::Navigate)
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.ui.get_or_insert_with(StepUi::default).content = Some(content.to_string());
        self
    }

    pub fn with_arrow(mut self, targets: &[&str]) -> Self {
        self.ui.get_or_insert_with(StepUi::default).arrow =
            Some(targets.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn content(&self) -> &str {
        self.ui
            .as_ref()
            .and_then(|ui| ui.content.as_deref())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.kind.default_content())
    }

    /// Declared arrow selectors, else the step's own CSS selector.
    pub fn arrow_targets(&self) -> Vec<String> {
        if let Some(arrow) = self.ui.as_ref().and_then(|ui| ui.arrow.as_ref()) {
            return arrow.clone();
        }
        self.selector
            .as_ref()
            .and_then(|s| s.css.clone())
            .into_iter()
            .collect()
    }

    pub fn value(&self) -> &str {
        self.payload
            .as_ref()
            .and_then(|p| p.value.as_deref())
            .unwrap_or_default()
    }

    pub fn url(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|p| p.url.as_deref())
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub version: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vars: Option<BTreeMap<String, String>>,
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn new(id: &str, steps: Vec<Step>) -> Self {
        Self {
            version: VERSION.to_string(),
            id: id.to_string(),
            name: None,
            metadata: None,
            vars: None,
            steps,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Parses and validates a document. Every violation is reported.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let report = validate::validate(&value);
        if !report.ok {
            return Err(WorkflowError::Invalid(report.errors));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}
