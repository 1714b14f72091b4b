//! Configuration management
//!
//! Layered with the `config` crate: built-in defaults, then an optional file
//! (`CALLKEEPER_CONFIG`, default `config/callkeeper.*`), then environment
//! variables such as `CALLKEEPER_TERMINATION__DISCONNECT_TIMEOUT_MS=2000`.

use crate::application::call_controller::ControllerSettings;
use crate::domain::call::phrase::{TerminationPhraseSet, DEFAULT_FALLBACK_ACKNOWLEDGMENT};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use config::{ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "CALLKEEPER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/callkeeper";
const ENV_PREFIX: &str = "CALLKEEPER";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub termination: TerminationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// DEBUG, INFO, WARNING, ERROR or CRITICAL; `LOG_LEVEL` overrides it
    pub level: String,
    /// One JSON object per line instead of the human-readable format
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminationConfig {
    /// Replaces the default phrase list when present and non-empty
    pub phrases: Option<Vec<String>>,
    pub disconnect_timeout_ms: u64,
    pub fallback_acknowledgment: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            json: false,
        }
    }
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            phrases: None,
            disconnect_timeout_ms: 5000,
            fallback_acknowledgment: DEFAULT_FALLBACK_ACKNOWLEDGMENT.to_string(),
        }
    }
}

impl Config {
    /// Load from the configured file (if it exists) and the environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        config::Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("termination.phrases")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(toml: &str) -> std::result::Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.termination.disconnect_timeout_ms == 0 {
            return Err(DomainError::InvalidConfiguration(
                "termination.disconnect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.termination.fallback_acknowledgment.trim().is_empty() {
            return Err(DomainError::InvalidConfiguration(
                "termination.fallback_acknowledgment must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl TerminationConfig {
    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }

    pub fn phrase_set(&self) -> Result<Arc<TerminationPhraseSet>> {
        TerminationPhraseSet::from_override(self.phrases.as_ref())
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            disconnect_timeout: self.disconnect_timeout(),
            fallback_acknowledgment: self.fallback_acknowledgment.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.logging.level, "INFO");
        assert_eq!(config.termination.disconnect_timeout(), Duration::from_secs(5));
        assert!(config.termination.phrases.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_overrides_defaults() {
        let config = Config::from_toml_str(
            r#"
            [logging]
            level = "debug"

            [termination]
            phrases = ["Farewell", "ciao"]
            disconnect_timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.json);
        assert_eq!(config.termination.disconnect_timeout_ms, 250);
        assert_eq!(
            config.termination.fallback_acknowledgment,
            DEFAULT_FALLBACK_ACKNOWLEDGMENT
        );

        let phrases = config.termination.phrase_set().unwrap();
        assert!(phrases.contains("farewell"));
        assert!(!phrases.contains("goodbye"));
    }

    #[test]
    fn test_empty_phrase_list_keeps_defaults() {
        let config = Config::from_toml_str("[termination]\nphrases = []\n").unwrap();
        let phrases = config.termination.phrase_set().unwrap();
        assert!(Arc::ptr_eq(&phrases, &TerminationPhraseSet::defaults()));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = Config::from_toml_str("[termination]\ndisconnect_timeout_ms = 0\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(DomainError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_controller_settings() {
        let config = Config::from_toml_str(
            "[termination]\ndisconnect_timeout_ms = 1500\nfallback_acknowledgment = \"Bye now.\"\n",
        )
        .unwrap();
        let settings = config.termination.controller_settings();
        assert_eq!(settings.disconnect_timeout, Duration::from_millis(1500));
        assert_eq!(settings.fallback_acknowledgment, "Bye now.");
    }
}
