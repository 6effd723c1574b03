//! Structural and per-type checks on a raw workflow document
//!
//! Works on untyped JSON so that every problem is reported at once, before
//! the document is deserialized.

use crate::types::{StepType, Workflow, VERSION};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            ok: errors.is_empty(),
            errors,
        }
    }
}

/// JavaScript-style truthiness, which is what documents in the wild were
/// written against.
fn truthy(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

pub fn validate(doc: &Value) -> ValidationResult {
    let Some(wf) = doc.as_object() else {
        return ValidationResult::from_errors(vec!["Not an object".to_string()]);
    };
    let mut errors = Vec::new();

    if wf.get("version").and_then(Value::as_str) != Some(VERSION) {
        errors.push(format!("version must be \"{}\"", VERSION));
    }
    if !truthy(wf.get("id")) {
        errors.push("id is required".to_string());
    }

    match wf.get("steps") {
        Some(Value::Array(steps)) if steps.is_empty() => {
            errors.push("steps cannot be empty".to_string());
        }
        Some(Value::Array(steps)) => {
            for (i, step) in steps.iter().enumerate() {
                validate_step(i, step, &mut errors);
            }
        }
        _ => errors.push("steps must be an array".to_string()),
    }

    ValidationResult::from_errors(errors)
}

fn validate_step(i: usize, step: &Value, errors: &mut Vec<String>) {
    let empty = serde_json::Map::new();
    let fields = match step.as_object() {
        Some(fields) => fields,
        None => {
            errors.push(format!("steps[{}] must be an object", i));
            &empty
        }
    };

    let Some(kind) = fields.get("type").and_then(Value::as_str).and_then(StepType::parse) else {
        errors.push(format!("steps[{}].type invalid", i));
        return;
    };

    let selector = fields.get("selector");
    if kind.requires_selector() && !truthy(selector) {
        errors.push(format!(
            "steps[{}].selector required for type {}",
            i,
            kind.as_str()
        ));
    } else if truthy(selector) && !selector.is_some_and(Value::is_object) {
        errors.push(format!("steps[{}].selector must be an object", i));
    }

    let payload = fields.get("payload").filter(|p| !p.is_null());
    if payload.is_some_and(|p| !p.is_object()) {
        errors.push(format!("steps[{}].payload must be an object", i));
    }
    let string_fields = [
        ("value", kind == StepType::Input),
        ("url", kind == StepType::Navigate),
    ];
    for (field, required) in string_fields {
        let v = payload.and_then(|p| p.get(field));
        match v {
            None | Some(Value::Null) | Some(Value::String(_)) => {
                if required && !truthy(v) {
                    errors.push(format!(
                        "steps[{}].payload.{} required for {}",
                        i,
                        field,
                        kind.as_str()
                    ));
                }
            }
            Some(_) => errors.push(format!("steps[{}].payload.{} must be a string", i, field)),
        }
    }

    match fields.get("timeout") {
        None | Some(Value::Null) => {}
        Some(t) if t.is_u64() => {}
        Some(_) => errors.push(format!(
            "steps[{}].timeout must be a non-negative integer",
            i
        )),
    }
    match fields.get("mode") {
        None | Some(Value::Null) => {}
        Some(Value::String(m)) if m == "guide" || m == "auto" => {}
        Some(_) => errors.push(format!("steps[{}].mode must be \"guide\" or \"auto\"", i)),
    }
}

/// Validates an already typed document, e.g. one built in code or by the
/// recorder.
pub fn validate_workflow(workflow: &Workflow) -> ValidationResult {
    match serde_json::to_value(workflow) {
        Ok(value) => validate(&value),
        Err(e) => ValidationResult::from_errors(vec![e.to_string()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn click_without_selector() {
        let r = validate(&json!({"version": "1.0", "id": "w1", "steps": [{"type": "click"}]}));
        assert!(!r.ok);
        assert_eq!(r.errors, vec!["steps[0].selector required for type click"]);
    }

    #[test]
    fn navigate_with_url_is_valid() {
        let r = validate(&json!({
            "version": "1.0",
            "id": "w1",
            "steps": [{"type": "navigate", "payload": {"url": "https://x"}}]
        }));
        assert!(r.ok);
        assert!(r.errors.is_empty());
    }

    #[test]
    fn accumulates_every_violation() {
        let r = validate(&json!({
            "version": "1",
            "steps": [
                {"type": "input", "selector": {"css": "#q"}},
                {"type": "navigate", "payload": {"url": ""}},
                {"type": "hover"},
                7,
                {"type": "waitFor"}
            ]
        }));
        assert!(!r.ok);
        assert_eq!(
            r.errors,
            vec![
                "version must be \"1.0\"",
                "id is required",
                "steps[0].payload.value required for input",
                "steps[1].payload.url required for navigate",
                "steps[2].type invalid",
                "steps[3] must be an object",
                "steps[3].type invalid",
                "steps[4].selector required for type waitFor",
            ]
        );
    }

    #[test]
    fn mistyped_fields_are_reported_not_rejected_later() {
        let doc = json!({
            "version": "1.0",
            "id": "w1",
            "steps": [
                {"type": "input", "selector": {"css": "#q"}, "payload": {"value": 5}},
                {"type": "navigate", "payload": {"url": ["https://x"]}},
                {"type": "click", "selector": "#a"},
                {"type": "waitFor", "selector": {"css": "#b"}, "timeout": "soon", "mode": "fast"},
                {"type": "message", "payload": "hi"}
            ]
        });
        let r = validate(&doc);
        assert_eq!(
            r.errors,
            vec![
                "steps[0].payload.value must be a string",
                "steps[1].payload.url must be a string",
                "steps[2].selector must be an object",
                "steps[3].timeout must be a non-negative integer",
                "steps[3].mode must be \"guide\" or \"auto\"",
                "steps[4].payload must be an object",
            ]
        );
        match Workflow::from_value(doc) {
            Err(crate::WorkflowError::Invalid(errors)) => assert_eq!(errors, r.errors),
            other => panic!("unexpected {:?}", other.map(|w| w.id)),
        }
    }

    #[test]
    fn steps_shape() {
        let r = validate(&json!({"version": "1.0", "id": "w", "steps": []}));
        assert_eq!(r.errors, vec!["steps cannot be empty"]);
        let r = validate(&json!({"version": "1.0", "id": "w", "steps": {"0": {}}}));
        assert_eq!(r.errors, vec!["steps must be an array"]);
        let r = validate(&json!({"version": "1.0", "id": "w"}));
        assert_eq!(r.errors, vec!["steps must be an array"]);
    }

    #[test]
    fn non_object_document() {
        let r = validate(&json!([1, 2]));
        assert!(!r.ok);
        assert_eq!(r.errors, vec!["Not an object"]);
    }

    #[test]
    fn result_serializes_without_empty_errors() {
        let r = validate(&json!({
            "version": "1.0",
            "id": "w1",
            "steps": [{"type": "message"}]
        }));
        assert_eq!(serde_json::to_value(&r).unwrap(), json!({"ok": true}));
    }
}
