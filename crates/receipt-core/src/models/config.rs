//! Configuration structures for the scan pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use receipt_inference::DEFAULT_BASE_URL;

use crate::error::{ReceiptError, Result};
use crate::messages::Locale;

/// Main configuration for receipt-scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptConfig {
    /// Provider client configuration.
    pub extraction: ExtractionConfig,

    /// Scan session configuration.
    pub session: SessionConfig,

    /// History slot configuration.
    pub history: HistoryConfig,

    /// Presentation configuration.
    pub ui: UiConfig,
}

/// Provider client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Base URL of the API, without trailing slash.
    pub base_url: String,

    /// Environment variable consulted first for the API key.
    pub api_key_env: String,

    /// Stored API key, used when the environment provides none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// HTTP timeout in seconds. Unset means the transport default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: "API_KEY".to_string(),
            api_key: None,
            timeout_secs: None,
        }
    }
}

/// Scan session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay before a rejected credential triggers reselection (ms).
    pub reselect_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reselect_delay_ms: 2000,
        }
    }
}

/// History slot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Override for the history file. Defaults to the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Presentation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Language of user-facing messages.
    pub locale: Locale,
}

impl ReceiptConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| ReceiptError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ReceiptError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ReceiptConfig::default();
        assert_eq!(config.extraction.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.extraction.api_key_env, "API_KEY");
        assert_eq!(config.session.reselect_delay_ms, 2000);
        assert_eq!(config.ui.locale, Locale::En);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: ReceiptConfig =
            serde_json::from_str(r#"{"ui": {"locale": "ko"}, "session": {}}"#).unwrap();
        assert_eq!(config.ui.locale, Locale::Ko);
        assert_eq!(config.session.reselect_delay_ms, 2000);
        assert!(config.extraction.api_key.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = ReceiptConfig::default();
        config.extraction.api_key = Some("k-123".to_string());
        config.save(&path).unwrap();

        let loaded = ReceiptConfig::from_file(&path).unwrap();
        assert_eq!(loaded.extraction.api_key.as_deref(), Some("k-123"));
    }

    #[test]
    fn test_invalid_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"ui": {"locale": "fr"}}"#).unwrap();

        match ReceiptConfig::from_file(&path) {
            Err(ReceiptError::Config(message)) => {
                assert!(message.contains("config.json"), "{message}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReceiptConfig::from_file(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ReceiptError::Io(_))));
    }
}
