//! Engine configuration
//!
//! Every tunable constant of the markup engine lives here. Configuration is
//! layered: defaults, then an optional JSON file, then `MARKUP_*` environment
//! overrides, then builder methods.

use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::annotation::Color;
use crate::bridge::MeasurementScale;
use crate::tools::ToolStyle;

/// Configuration for a [`crate::MarkupEngine`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lower bound for user zoom
    pub min_zoom: f64,
    /// Upper bound for user zoom
    pub max_zoom: f64,
    /// Multiplier applied by zoom-in
    pub zoom_in_factor: f64,
    /// Multiplier applied by zoom-out
    pub zoom_out_factor: f64,

    /// Largest rendered page edge in pixels; larger render scales are clamped
    pub max_render_dimension: f64,

    /// Page size used when the rasterizer reports unusable dimensions
    pub fallback_page_width: f64,
    pub fallback_page_height: f64,

    /// Undo stack bound
    pub history_limit: usize,

    /// Document-space offset applied to pasted copies
    pub paste_offset: f64,

    /// Previews smaller than this (view pixels) are discarded on release
    pub min_shape_size: f64,
    /// Freehand strokes with fewer points are discarded on release
    pub freehand_min_points: usize,

    /// Pointer-down in the text tool is ignored for this long after an edit exits
    pub text_cooldown_ms: u64,

    /// Bound for a single page rasterization
    pub render_timeout_ms: u64,

    pub placeholder_text: String,
    pub placeholder_color: Color,

    /// Width of a new text box in document units
    pub text_box_width: f64,

    /// Label given to new stamps
    pub stamp_label: String,

    /// Hit-test tolerance in view pixels
    pub hit_tolerance: f64,
    /// Resize handle radius in view pixels
    pub handle_size: f64,
    /// Arrowhead bounding size in view pixels
    pub arrow_head_size: f64,

    pub measurement: MeasurementScale,

    /// Style used by drawing tools until the host sets one
    pub default_style: ToolStyle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.25,
            max_zoom: 3.0,
            zoom_in_factor: 1.25,
            zoom_out_factor: 0.8,
            max_render_dimension: 4096.0,
            fallback_page_width: 612.0,
            fallback_page_height: 792.0,
            history_limit: 50,
            paste_offset: 20.0,
            min_shape_size: 5.0,
            freehand_min_points: 2,
            text_cooldown_ms: 300,
            render_timeout_ms: 10_000,
            placeholder_text: "Click to add text".to_string(),
            placeholder_color: Color::PLACEHOLDER_GRAY,
            text_box_width: 200.0,
            stamp_label: "APPROVED".to_string(),
            hit_tolerance: 4.0,
            handle_size: 6.0,
            arrow_head_size: 14.0,
            measurement: MeasurementScale::default(),
            default_style: ToolStyle::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a JSON file; missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration as pretty-printed JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Defaults with environment overrides applied.
    ///
    /// Environment variables:
    /// - `MARKUP_MIN_ZOOM`, `MARKUP_MAX_ZOOM`
    /// - `MARKUP_MAX_RENDER_DIMENSION`
    /// - `MARKUP_HISTORY_LIMIT`
    /// - `MARKUP_PASTE_OFFSET`
    /// - `MARKUP_TEXT_COOLDOWN_MS`
    /// - `MARKUP_RENDER_TIMEOUT_MS`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `MARKUP_*` environment overrides on top of this configuration.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        env_override("MARKUP_MIN_ZOOM", &mut self.min_zoom)?;
        env_override("MARKUP_MAX_ZOOM", &mut self.max_zoom)?;
        env_override("MARKUP_MAX_RENDER_DIMENSION", &mut self.max_render_dimension)?;
        env_override("MARKUP_HISTORY_LIMIT", &mut self.history_limit)?;
        env_override("MARKUP_PASTE_OFFSET", &mut self.paste_offset)?;
        env_override("MARKUP_TEXT_COOLDOWN_MS", &mut self.text_cooldown_ms)?;
        env_override("MARKUP_RENDER_TIMEOUT_MS", &mut self.render_timeout_ms)?;
        self.validate()
    }

    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |value: f64| value.is_finite() && value > 0.0;

        if !positive(self.min_zoom) || !positive(self.max_zoom) || self.min_zoom > self.max_zoom {
            return Err(ConfigError::InvalidValue("min_zoom/max_zoom".to_string()));
        }
        if !positive(self.zoom_in_factor) || !positive(self.zoom_out_factor) {
            return Err(ConfigError::InvalidValue("zoom factors".to_string()));
        }
        if !positive(self.max_render_dimension) {
            return Err(ConfigError::InvalidValue("max_render_dimension".to_string()));
        }
        if !positive(self.fallback_page_width) || !positive(self.fallback_page_height) {
            return Err(ConfigError::InvalidValue("fallback page size".to_string()));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::InvalidValue("history_limit".to_string()));
        }
        Ok(())
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_zoom_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_zoom = min;
        self.max_zoom = max;
        self
    }

    pub fn with_max_render_dimension(mut self, pixels: f64) -> Self {
        self.max_render_dimension = pixels;
        self
    }

    pub fn with_text_cooldown(mut self, cooldown: Duration) -> Self {
        self.text_cooldown_ms = cooldown.as_millis() as u64;
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn text_cooldown(&self) -> Duration {
        Duration::from_millis(self.text_cooldown_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }
}

fn env_override<T: FromStr>(name: &str, target: &mut T) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(name) {
        *target = value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(name.to_string()))?;
    }
    Ok(())
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: &[&str] = &[
        "MARKUP_MIN_ZOOM",
        "MARKUP_MAX_ZOOM",
        "MARKUP_MAX_RENDER_DIMENSION",
        "MARKUP_HISTORY_LIMIT",
        "MARKUP_PASTE_OFFSET",
        "MARKUP_TEXT_COOLDOWN_MS",
        "MARKUP_RENDER_TIMEOUT_MS",
    ];

    #[test]
    fn defaults_match_engine_contract() {
        let config = EngineConfig::default();
        assert_eq!(config.min_zoom, 0.25);
        assert_eq!(config.max_zoom, 3.0);
        assert_eq!(config.zoom_in_factor, 1.25);
        assert_eq!(config.zoom_out_factor, 0.8);
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.paste_offset, 20.0);
        assert_eq!(config.text_cooldown(), Duration::from_millis(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_methods() {
        let config = EngineConfig::default()
            .with_history_limit(10)
            .with_zoom_bounds(0.5, 2.0)
            .with_text_cooldown(Duration::from_millis(50));
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.min_zoom, 0.5);
        assert_eq!(config.text_cooldown_ms, 50);
    }

    #[test]
    fn inverted_zoom_bounds_are_rejected() {
        let config = EngineConfig::default().with_zoom_bounds(2.0, 1.0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        let _guard = EnvGuard::new(VARS);

        env::set_var("MARKUP_HISTORY_LIMIT", "12");
        env::set_var("MARKUP_MAX_ZOOM", "4.5");
        env::remove_var("MARKUP_PASTE_OFFSET");

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.history_limit, 12);
        assert_eq!(config.max_zoom, 4.5);
        assert_eq!(config.paste_offset, 20.0);
    }

    #[test]
    #[serial]
    fn env_invalid_value_is_reported() {
        let _guard = EnvGuard::new(VARS);

        env::set_var("MARKUP_HISTORY_LIMIT", "lots");
        match EngineConfig::from_env() {
            Err(ConfigError::InvalidValue(key)) => assert_eq!(key, "MARKUP_HISTORY_LIMIT"),
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "history_limit": 5, "placeholder_text": "Type here" }"#)
                .unwrap();
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.placeholder_text, "Type here");
        assert_eq!(config.max_zoom, 3.0);
    }

    #[test]
    fn file_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markup.json");

        let config = EngineConfig::default().with_history_limit(7);
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config, loaded);
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in var_names {
                env::remove_var(name);
            }
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }
}
