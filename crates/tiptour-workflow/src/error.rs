use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid workflow: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("malformed workflow JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("completion request failed: {0}")]
    Completion(String),

    #[error(transparent)]
    Core(#[from] tiptour_core::Error),
}

impl From<reqwest::Error> for WorkflowError {
    fn from(e: reqwest::Error) -> Self {
        WorkflowError::Completion(e.to_string())
    }
}
