//! Configuration module for the L0MDT readout tools
//!
//! Loaded from a TOML file. Every section is optional:
//!
//! ```toml
//! [decoder]
//! strict_word_count = false
//!
//! [render]
//! blank_line_before_header = true
//! format = "text"
//!
//! [emulator]
//! blocks = 10
//! mean_hits_per_block = 4.0
//! module_id = 2
//! seed = 12345
//! ```
//!
//! # Example
//! ```ignore
//! let config = Config::load("l0mdt.toml")?;
//! let decoder = FelixDecoder::new(config.decoder.clone());
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::data_source_emulator::EmulatorConfig;
use crate::reader::{FelixConfig, RenderConfig};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub decoder: FelixConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub emulator: EmulatorConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check value ranges serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.emulator.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::OutputFormat;

    #[test]
    fn parse_empty_config() {
        let config = Config::from_toml("").unwrap();
        assert!(!config.decoder.strict_word_count);
        assert!(config.render.blank_line_before_header);
        assert_eq!(config.render.format, OutputFormat::Text);
        assert_eq!(config.emulator.blocks, 10);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[decoder]
strict_word_count = true

[render]
blank_line_before_header = false
format = "json"

[emulator]
blocks = 3
mean_hits_per_block = 7.5
module_id = 1
seed = 42
"#;
        let config = Config::from_toml(toml).unwrap();

        assert!(config.decoder.strict_word_count);
        assert!(!config.render.blank_line_before_header);
        assert_eq!(config.render.format, OutputFormat::Json);
        assert_eq!(config.emulator.blocks, 3);
        assert_eq!(config.emulator.mean_hits_per_block, 7.5);
        assert_eq!(config.emulator.module_id, 1);
        assert_eq!(config.emulator.seed, Some(42));
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let toml = r#"
[render]
format = "json"
"#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.render.format, OutputFormat::Json);
        assert!(config.render.blank_line_before_header);
        assert_eq!(config.emulator.seed, None);
    }

    #[test]
    fn unknown_format_is_error() {
        let toml = r#"
[render]
format = "xml"
"#;
        assert!(matches!(
            Config::from_toml(toml),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    fn negative_hit_mean_is_error() {
        let toml = r#"
[emulator]
mean_hits_per_block = -1.0
"#;
        let err = Config::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("mean_hits_per_block"));
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let config = Config::load_or_default("/nonexistent/l0mdt.toml").unwrap();
        assert_eq!(config.emulator.blocks, 10);
        assert!(Config::load("/nonexistent/l0mdt.toml").is_err());
    }
}
