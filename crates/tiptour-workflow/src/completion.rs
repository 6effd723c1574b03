//! AI completion collaborator: `prompt -> answer`
//!
//! [`ChatCompletionClient`] talks to any OpenAI-compatible chat completions
//! endpoint (a local LM Studio server by default). Callers that show the
//! answer to a user go through [`complete_or_fallback`], which never fails.

use crate::config::CompletionConfig;
use crate::error::{Result, WorkflowError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const FALLBACK_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";
pub const EMPTY_PROMPT_MESSAGE: &str = "Please enter a question.";
pub const NO_RESPONSE_MESSAGE: &str = "No response generated.";

pub trait Completion {
    fn complete(&self, prompt: &str) -> Result<String>;
}

impl<F> Completion for F
where
    F: Fn(&str) -> Result<String>,
{
    fn complete(&self, prompt: &str) -> Result<String> {
        self(prompt)
    }
}

/// Any failure becomes [`FALLBACK_MESSAGE`].
pub fn complete_or_fallback(completion: &dyn Completion, prompt: &str) -> String {
    match completion.complete(prompt) {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!("completion failed: {}", e);
            FALLBACK_MESSAGE.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatMessage>,
}

impl ChatResponse {
    /// First choice's content, or [`NO_RESPONSE_MESSAGE`].
    pub fn answer(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.as_str())
            .filter(|c| !c.is_empty())
            .unwrap_or(NO_RESPONSE_MESSAGE)
            .to_string()
    }
}

pub struct ChatCompletionClient {
    config: CompletionConfig,
    client: reqwest::blocking::Client,
}

impl ChatCompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    pub fn build_request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: self.config.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: prompt.trim().to_string(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        }
    }

    /// `GET <base>/models` answers with success.
    pub fn check_connection(&self) -> bool {
        let url = models_url(&self.config.endpoint);
        let mut req = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        match req.send() {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!("{} unreachable: {}", url, e);
                false
            }
        }
    }
}

impl Completion for ChatCompletionClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Ok(EMPTY_PROMPT_MESSAGE.to_string());
        }
        let body = self.build_request(prompt);
        tracing::debug!("completion request to {} ({})", self.config.endpoint, body.model);

        let mut req = self
            .client
            .post(&self.config.endpoint)
            .header("Accept", "application/json")
            .json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send()?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(WorkflowError::Completion(format!("{}: {}", status, text)));
        }
        let parsed: ChatResponse = resp.json()?;
        Ok(parsed.answer())
    }
}

/// `http://host/v1/chat/completions` -> `http://host/v1/models`.
fn models_url(endpoint: &str) -> String {
    match endpoint.strip_suffix("/chat/completions") {
        Some(base) => format!("{}/models", base),
        None => format!("{}/models", endpoint.trim_end_matches('/')),
    }
}
