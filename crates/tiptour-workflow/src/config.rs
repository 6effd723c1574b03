//! Player and completion settings

use crate::types::Mode;
use serde::{Deserialize, Serialize};
use tiptour_core::Millis;
use tiptour_tooltip::TooltipConfig;

pub const MESSAGE_GRACE_MS: Millis = 1000;
pub const INPUT_GRACE_MS: Millis = 500;
pub const POLL_INTERVAL_MS: Millis = 200;
pub const DEFAULT_WAIT_TIMEOUT_MS: Millis = 15_000;
pub const PLAYER_HIDE_DELAY_MS: Millis = 8000;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:1234/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gemma-3-270m-it-mlx";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant in a tooltip. Provide concise, clear answers. Keep responses brief but informative.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Used by steps that do not set their own `mode`.
    pub mode: Mode,
    /// Adds a free-form input to the tooltip; submissions are delivered
    /// through [`Player::submissions`](crate::Player::submissions).
    pub include_input: bool,
    pub input_placeholder: String,
    pub message_grace_ms: Millis,
    pub input_grace_ms: Millis,
    pub poll_interval_ms: Millis,
    pub wait_timeout_ms: Millis,
    pub tooltip: TooltipConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Guide,
            include_input: false,
            input_placeholder: tiptour_tooltip::controller::DEFAULT_PLACEHOLDER.to_string(),
            message_grace_ms: MESSAGE_GRACE_MS,
            input_grace_ms: INPUT_GRACE_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            tooltip: TooltipConfig::default()
                .with_arrow()
                .with_hide_delay(PLAYER_HIDE_DELAY_MS),
        }
    }
}

impl PlayerConfig {
    pub fn auto() -> Self {
        Self {
            mode: Mode::Auto,
            ..Self::default()
        }
    }

    pub fn with_input(mut self, placeholder: &str) -> Self {
        self.include_input = true;
        self.input_placeholder = placeholder.to_string();
        self
    }
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.7,
            max_tokens: 150,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.mode, Mode::Guide);
        assert!(config.tooltip.arrow.enabled);
        assert_eq!(config.tooltip.hide_delay_ms, 8000);
        assert_eq!(config.wait_timeout_ms, 15_000);
        assert!(!config.include_input);
    }

    #[test]
    fn partial_completion_config() {
        let config: CompletionConfig =
            serde_json::from_str(r#"{"model": "gpt-4o-mini", "api_key": "k"}"#).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.max_tokens, 150);
        assert_eq!(config.api_key.as_deref(), Some("k"));
    }
}
