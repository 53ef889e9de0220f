//! Pipeline configuration from YAML/JSON.
//!
//! Every field has a default, so an empty document is a valid config.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default minimum support score for a claim to survive grounding.
pub const DEFAULT_THRESHOLD: f64 = 0.30;

/// Default number of input characters kept in a recovery error preview.
pub const DEFAULT_PREVIEW_CHARS: usize = 300;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Grounding section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundingConfig {
    /// Minimum Jaccard support score, in `[0, 1]`
    pub threshold: f64,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Recovery section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Characters of raw input echoed in a recovery error
    pub preview_chars: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub grounding: GroundingConfig,

    #[serde(default)]
    pub recovery: RecoveryConfig,
}

impl PipelineConfig {
    /// Parse a config from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document; treat it as all defaults.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a config file, choosing the format by extension (`.json` or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_file(path)
        } else {
            Self::from_yaml_file(path)
        }
    }

    /// Override the grounding threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.grounding.threshold = threshold;
        self
    }

    /// Check semantic constraints the types cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.grounding.threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::ValidationError(format!(
                "grounding.threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        if self.recovery.preview_chars == 0 {
            return Err(ConfigError::ValidationError(
                "recovery.preview_chars must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.grounding.threshold, 0.30);
        assert_eq!(config.recovery.preview_chars, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let config = PipelineConfig::from_yaml(
            r#"
grounding:
  threshold: 0.5
recovery:
  preview_chars: 120
"#,
        )
        .unwrap();
        assert_eq!(config.grounding.threshold, 0.5);
        assert_eq!(config.recovery.preview_chars, 120);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = PipelineConfig::from_yaml("grounding: {}\n").unwrap();
        assert_eq!(config, PipelineConfig::default());

        assert_eq!(PipelineConfig::from_yaml("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_parse_json() {
        let config = PipelineConfig::from_json(r#"{"grounding": {"threshold": 0.1}}"#).unwrap();
        assert_eq!(config.grounding.threshold, 0.1);
        assert_eq!(config.recovery, RecoveryConfig::default());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let result = PipelineConfig::from_yaml("grounding:\n  threshold: 1.5\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let config = PipelineConfig::default().with_threshold(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_preview_rejected() {
        let result = PipelineConfig::from_json(r#"{"recovery": {"preview_chars": 0}}"#);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_malformed_yaml() {
        let result = PipelineConfig::from_yaml("grounding: [unclosed");
        assert!(matches!(result, Err(ConfigError::YamlError(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = PipelineConfig::from_file("/nonexistent/medscribe.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
