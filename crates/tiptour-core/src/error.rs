//! Structured errors, serializable so callers can report them as JSON

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize, ThisError)]
#[error("[{code:?}] {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    EnvironmentUnavailable,
    NodeNotFound,
    SelectorInvalid,
    InvalidDocument,
    Timeout,
    Io,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn environment(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::EnvironmentUnavailable, reason).with_suggestions(vec![
            "Attach the tooltip to an element that is connected to the document".to_string(),
        ])
    }

    pub fn node_not_found(what: &str) -> Self {
        Self::new(ErrorCode::NodeNotFound, format!("No node matching: {}", what))
    }

    pub fn selector_invalid(selector: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::SelectorInvalid,
            format!("Invalid selector '{}': {}", selector, reason),
        )
    }

    pub fn invalid_document(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidDocument, reason)
    }

    pub fn timeout(what: &str, timeout_ms: u64) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Timeout after {}ms waiting for: {}", timeout_ms, what),
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::Io, e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorCode::InvalidDocument, e.to_string())
    }
}
