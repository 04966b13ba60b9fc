//! Configuration for the Keystroke Sampler.

use crate::core::curation::CurationConfig;
use crate::core::label::Label;
use crate::core::schema::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for capture and curation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Password every participant types
    pub target_password: String,

    /// Samples to collect per participant
    pub samples_per_user: u64,

    /// Participant name used when none is given on the command line
    pub default_user: String,

    /// Label applied when none is given on the command line
    pub default_label: Label,

    /// Directory holding the sample files
    pub output_dir: PathBuf,

    /// File name of the millisecond (seconds-valued) sample file
    pub ms_file: String,

    /// File name of the nanosecond sample file
    pub ns_file: String,

    /// Path for storing the sample ledger
    pub data_path: PathBuf,

    /// Settings for the curation step
    pub curation: CurationConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keystroke-sampler");

        Self {
            target_password: ".tie5Roanl".to_string(),
            samples_per_user: 20,
            default_user: "default_user".to_string(),
            default_label: Label::Genuine,
            output_dir: PathBuf::from("."),
            ms_file: "Keystrokes.csv".to_string(),
            ns_file: "KeystrokesInNano.csv".to_string(),
            data_path: data_dir,
            curation: CurationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keystroke-sampler")
            .join("config.json")
    }

    /// Reject settings no capture session could work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_password.chars().count() < 2 {
            return Err(ConfigError::Invalid(
                "target_password needs at least two characters".to_string(),
            ));
        }
        if self.samples_per_user == 0 {
            return Err(ConfigError::Invalid(
                "samples_per_user must be at least 1".to_string(),
            ));
        }
        if self.ms_file == self.ns_file {
            return Err(ConfigError::Invalid(
                "ms_file and ns_file must differ".to_string(),
            ));
        }
        self.curation
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    pub fn ms_path(&self) -> PathBuf {
        self.output_dir.join(&self.ms_file)
    }

    pub fn ns_path(&self) -> PathBuf {
        self.output_dir.join(&self.ns_file)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_path.join("samples.json")
    }

    /// Column schema of the sample files for the configured password.
    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::for_password(&self.target_password)
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.target_password, ".tie5Roanl");
        assert_eq!(config.samples_per_user, 20);
        assert_eq!(config.default_label, Label::Genuine);
        assert_eq!(config.ms_path(), PathBuf::from("./Keystrokes.csv"));
        assert_eq!(config.ns_path(), PathBuf::from("./KeystrokesInNano.csv"));
        assert_eq!(config.curation.margin, 0.25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_schema_follows_password() {
        let config = Config::default();
        assert_eq!(config.schema().feature_count(), 28);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"target_password": "abc", "samples_per_user": 5}"#).unwrap();
        assert_eq!(config.target_password, "abc");
        assert_eq!(config.samples_per_user, 5);
        assert_eq!(config.ms_file, "Keystrokes.csv");
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut config = Config::default();
        config.target_password = "a".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.ns_file = config.ms_file.clone();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.curation.margin = 0.7;
        assert!(config.validate().is_err());
    }
}
