//! Settings file (`~/.tiptour/config.toml`)
//!
//! ```toml
//! workflows_dir = "/home/me/flows"
//!
//! [viewport]
//! width = 1440
//! height = 900
//!
//! [player]
//! mode = "auto"
//!
//! [player.tooltip]
//! friction = 0.85
//!
//! [completion]
//! endpoint = "http://localhost:1234/v1/chat/completions"
//! model = "gemma-3-270m-it-mlx"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tiptour::workflow::{CompletionConfig, PlayerConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSettings {
    pub width: f64,
    pub height: f64,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        let v = tiptour::page::DEFAULT_VIEWPORT;
        Self {
            width: v.width,
            height: v.height,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub workflows_dir: Option<PathBuf>,
    pub viewport: ViewportSettings,
    pub player: PlayerConfig,
    pub completion: CompletionConfig,
}

pub fn default_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".tiptour").join("config.toml"))
}

impl Settings {
    /// An explicit path must exist; the default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        let settings =
            toml::from_str(&text).with_context(|| format!("parsing settings {}", path.display()))?;
        tracing::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiptour::workflow::Mode;

    #[test]
    fn empty_file_is_all_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.viewport.width, 1280.0);
    }

    #[test]
    fn nested_overrides() {
        let settings: Settings = toml::from_str(
            r#"
            workflows_dir = "/tmp/flows"

            [player]
            mode = "auto"
            wait_timeout_ms = 2000

            [player.tooltip]
            friction = 0.5

            [completion]
            model = "local"
            "#,
        )
        .unwrap();
        assert_eq!(settings.workflows_dir.as_deref(), Some(Path::new("/tmp/flows")));
        assert_eq!(settings.player.mode, Mode::Auto);
        assert_eq!(settings.player.wait_timeout_ms, 2000);
        assert_eq!(settings.player.tooltip.friction, 0.5);
        assert_eq!(settings.completion.model, "local");
        assert_eq!(settings.completion.max_tokens, 150);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&tmp.path().join("nope.toml"))).is_err());

        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[viewport]\nwidth = 800\n").unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.viewport.width, 800.0);
        assert_eq!(settings.viewport.height, 800.0);
    }
}
