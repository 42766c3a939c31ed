//! Terminal configuration
//!
//! Loaded from JSON. Every field has a default, so `{}` is a complete
//! configuration and hosts only need to override what they care about.

use serde::{Deserialize, Serialize};

/// Output animation pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Delay between revealed characters; 0 renders each line at once
    pub char_delay_ms: u32,
    pub line_base_delay_ms: u32,
    /// Inter-line jitter, applied as +/- around the base
    pub line_variation_ms: u32,
    pub min_line_delay_ms: u32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            char_delay_ms: 0,
            line_base_delay_ms: 60,
            line_variation_ms: 30,
            min_line_delay_ms: 20,
        }
    }
}

impl AnimationConfig {
    /// Pause between two lines for a random sample in `[0, 1)`
    pub fn line_delay(&self, random: f64) -> u32 {
        let jitter = (random.clamp(0.0, 1.0) * 2.0 - 1.0) * f64::from(self.line_variation_ms);
        let delay = (f64::from(self.line_base_delay_ms) + jitter).round();
        delay.max(f64::from(self.min_line_delay_ms)) as u32
    }

    /// No pacing at all
    pub fn instant() -> Self {
        Self {
            char_delay_ms: 0,
            line_base_delay_ms: 0,
            line_variation_ms: 0,
            min_line_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub username: String,
    pub hostname: String,
    pub greeting: String,
    pub history_size: usize,
    pub blink_interval_ms: u32,
    pub click_threshold_px: f64,
    pub caret_glyph: String,
    pub animation: AnimationConfig,
    pub debug_events: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "v0.8.0".into(),
            username: "anonymous".into(),
            hostname: "simplets".into(),
            greeting: "Welcome to the abyss. Type [help] to interact.".into(),
            history_size: crate::terminal::core::DEFAULT_HISTORY_SIZE,
            blink_interval_ms: 500,
            click_threshold_px: 5.0,
            caret_glyph: "_".into(),
            animation: AnimationConfig::default(),
            debug_events: false,
            log_level: "info".into(),
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError)
    }

    pub fn prompt(&self) -> String {
        format!("{}: ", self.username)
    }

    /// Output of the `version` built-in
    pub fn version_banner(&self) -> String {
        let version = self.version.trim_start_matches('v');
        format!("SimpleTS Terminal v{}", version)
    }
}

/// Invalid configuration JSON
#[derive(Debug)]
pub struct ConfigError(serde_json::Error);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid config: {}", self.0)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_override() {
        let config =
            Config::from_json(r#"{"username":"neo","animation":{"char_delay_ms":5}}"#).unwrap();
        assert_eq!(config.prompt(), "neo: ");
        assert_eq!(config.animation.char_delay_ms, 5);
        assert_eq!(config.animation.line_base_delay_ms, 60);
        assert_eq!(config.history_size, 100);
    }

    #[test]
    fn test_invalid_json() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(err.to_string().starts_with("invalid config"));
    }

    #[test]
    fn test_version_banner() {
        assert_eq!(Config::default().version_banner(), "SimpleTS Terminal v0.8.0");
    }

    #[test_case(0.5, 60 ; "no jitter")]
    #[test_case(0.0, 30 ; "lowest")]
    #[test_case(0.999_999, 90 ; "highest")]
    fn test_line_delay(random: f64, expected: u32) {
        assert_eq!(AnimationConfig::default().line_delay(random), expected);
    }

    #[test]
    fn test_line_delay_floor() {
        let anim = AnimationConfig {
            line_base_delay_ms: 10,
            line_variation_ms: 30,
            min_line_delay_ms: 20,
            ..AnimationConfig::default()
        };
        assert_eq!(anim.line_delay(0.0), 20);
    }
}
