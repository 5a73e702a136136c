//! CLI subcommands.

pub mod config;
pub mod history;
pub mod key;
pub mod scan;

use std::path::{Path, PathBuf};

use receipt_core::history::HISTORY_SLOT;
use receipt_core::ReceiptConfig;

/// Directory name used under the platform config and data dirs.
const APP_DIR: &str = "receipt-scan";

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.json")
}

/// The `--config` path, or the default one.
pub fn config_path(config_path: Option<&str>) -> PathBuf {
    config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Load configuration, falling back to defaults when the file does not exist.
pub fn load_config(path: &Path) -> anyhow::Result<ReceiptConfig> {
    if path.exists() {
        Ok(ReceiptConfig::from_file(path)?)
    } else {
        Ok(ReceiptConfig::default())
    }
}

/// File holding the scan history.
pub fn history_path(config: &ReceiptConfig) -> PathBuf {
    config.history.path.clone().unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(format!("{HISTORY_SLOT}.json"))
    })
}

/// Put `text` on the system clipboard, verbatim.
pub fn copy_to_clipboard(text: &str) -> anyhow::Result<()> {
    let mut clipboard = arboard::Clipboard::new()
        .map_err(|e| anyhow::anyhow!("Clipboard unavailable: {}", e))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to copy to clipboard: {}", e))?;
    Ok(())
}
