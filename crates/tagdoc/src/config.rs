//! Configuration management for tagdoc.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::emulator::DEFAULT_CAPACITY;
use crate::error::{Error, Result};
use crate::hardware::Technology;
use crate::ndef::LanguageCode;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "tagdoc";

/// Default tag image file name.
const TAG_IMAGE_FILE_NAME: &str = "tag.ndef";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `TAGDOC_`, sections split by `__`)
/// 2. TOML config file at `~/.config/tagdoc/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Radio and record format configuration.
    pub nfc: NfcConfig,
    /// Emulated tag configuration.
    pub emulator: EmulatorConfig,
}

/// Radio and record format configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NfcConfig {
    /// Technology requested for every session.
    pub technology: Technology,
    /// Language code written into text records.
    pub language: String,
    /// Prompt shown while waiting for a tag.
    pub alert_message: String,
}

/// Emulated tag configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Path to the tag image file.
    /// Defaults to `~/.local/share/tagdoc/tag.ndef`
    pub image_path: Option<PathBuf>,
    /// Usable NDEF capacity of the emulated tag in bytes.
    pub capacity: usize,
    /// Refuse writes to the emulated tag.
    pub read_only: bool,
}

impl Default for NfcConfig {
    fn default() -> Self {
        Self {
            technology: Technology::Ndef,
            language: "en".to_string(),
            alert_message: "Hold your device near the tag".to_string(),
        }
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            image_path: None, // Will be resolved to default at runtime
            capacity: DEFAULT_CAPACITY,
            read_only: false,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("TAGDOC_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.language_code()?;

        if self.emulator.capacity == 0 {
            return Err(Error::ConfigValidation {
                message: "emulator capacity must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// The configured language code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code cannot be written into a text record.
    pub fn language_code(&self) -> Result<LanguageCode> {
        LanguageCode::parse(&self.nfc.language).map_err(|err| Error::ConfigValidation {
            message: err.to_string(),
        })
    }

    /// Get the tag image path, resolving defaults if not set.
    #[must_use]
    pub fn image_path(&self) -> PathBuf {
        self.emulator
            .image_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(TAG_IMAGE_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.nfc.technology, Technology::Ndef);
        assert_eq!(config.nfc.language, "en");
        assert!(!config.nfc.alert_message.is_empty());
        assert_eq!(config.emulator.capacity, DEFAULT_CAPACITY);
        assert!(!config.emulator.read_only);
        assert!(config.emulator.image_path.is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_language() {
        let mut config = Config::default();
        config.nfc.language = "not a code".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("language code"));
    }

    #[test]
    fn test_validate_zero_capacity() {
        let mut config = Config::default();
        config.emulator.capacity = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("capacity"));
    }

    #[test]
    fn test_language_code() {
        let mut config = Config::default();
        config.nfc.language = "en-GB".to_string();
        assert_eq!(config.language_code().unwrap().as_str(), "en-GB");
    }

    #[test]
    fn test_image_path_default() {
        let config = Config::default();
        assert!(config.image_path().to_string_lossy().contains("tag.ndef"));
    }

    #[test]
    fn test_image_path_custom() {
        let mut config = Config::default();
        config.emulator.image_path = Some(PathBuf::from("/tmp/custom.ndef"));
        assert_eq!(config.image_path(), PathBuf::from("/tmp/custom.ndef"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("tagdoc"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert_eq!(result.unwrap(), Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[nfc]\ntechnology = \"iso_dep\"\nlanguage = \"fr\"\n\n[emulator]\ncapacity = 888\nread_only = true\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.nfc.technology, Technology::IsoDep);
        assert_eq!(config.nfc.language, "fr");
        assert_eq!(config.emulator.capacity, 888);
        assert!(config.emulator.read_only);
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[emulator]\ncapacity = 0\n").unwrap();

        assert!(matches!(
            Config::load_from(Some(path)),
            Err(Error::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("\"technology\":\"ndef\""));
        assert!(json.contains("capacity"));
    }

    #[test]
    fn test_emulator_config_deserialize() {
        let json = r#"{"capacity": 144}"#;
        let emulator: EmulatorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(emulator.capacity, 144);
        assert!(!emulator.read_only);
    }
}
