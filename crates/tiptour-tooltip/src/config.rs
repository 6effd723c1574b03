//! Tooltip configuration with the documented defaults

use serde::{Deserialize, Serialize};
use tiptour_core::cursor::{DEFAULT_FRICTION, DEFAULT_RADIUS};
use tiptour_core::{Millis, Point};

pub const DEFAULT_CLASS_NAME: &str = "tiptour-tooltip";
pub const DEFAULT_Z_INDEX: i32 = 10000;
pub const DEFAULT_HIDE_DELAY_MS: Millis = 5000;
pub const DEFAULT_SHOW_DELAY_MS: Millis = 0;
pub const DEFAULT_OFFSET: Point = Point::new(20.0, 20.0);
pub const DEFAULT_ARROW_COLOR: &str = "#1a1a1a";
pub const DEFAULT_ARROW_SIZE: u32 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrowConfig {
    pub enabled: bool,
    pub color: String,
    pub size: u32,
}

impl Default for ArrowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            color: DEFAULT_ARROW_COLOR.to_string(),
            size: DEFAULT_ARROW_SIZE,
        }
    }
}

impl ArrowConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TooltipConfig {
    /// Listen to the pointer from construction.
    pub enabled: bool,
    pub smooth_radius: f64,
    pub friction: f64,
    pub offset: Point,
    pub initial_point: Point,
    pub class_name: String,
    pub z_index: i32,
    pub hide_delay_ms: Millis,
    pub show_delay_ms: Millis,
    /// Box size used for edge flipping until the host measures the element.
    pub width: f64,
    pub height: f64,
    pub arrow: ArrowConfig,
}

impl Default for TooltipConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smooth_radius: DEFAULT_RADIUS,
            friction: DEFAULT_FRICTION,
            offset: DEFAULT_OFFSET,
            initial_point: Point::ORIGIN,
            class_name: DEFAULT_CLASS_NAME.to_string(),
            z_index: DEFAULT_Z_INDEX,
            hide_delay_ms: DEFAULT_HIDE_DELAY_MS,
            show_delay_ms: DEFAULT_SHOW_DELAY_MS,
            width: 240.0,
            height: 64.0,
            arrow: ArrowConfig::default(),
        }
    }
}

impl TooltipConfig {
    pub fn with_arrow(mut self) -> Self {
        self.arrow.enabled = true;
        self
    }

    pub fn with_hide_delay(mut self, ms: Millis) -> Self {
        self.hide_delay_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: TooltipConfig = serde_json::from_str(r#"{"friction": 0.5, "arrow": {"enabled": true}}"#).unwrap();
        assert_eq!(config.friction, 0.5);
        assert_eq!(config.smooth_radius, 30.0);
        assert_eq!(config.offset, Point::new(20.0, 20.0));
        assert!(config.arrow.enabled);
        assert_eq!(config.arrow.color, "#1a1a1a");
        assert_eq!(config.arrow.size, 24);
    }

    #[test]
    fn defaults() {
        let config = TooltipConfig::default();
        assert_eq!(config.class_name, "tiptour-tooltip");
        assert_eq!(config.z_index, 10000);
        assert_eq!(config.hide_delay_ms, 5000);
        assert_eq!(config.show_delay_ms, 0);
        assert!(!config.arrow.enabled);
    }
}
