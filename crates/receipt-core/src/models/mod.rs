//! Data models.

pub mod config;
pub mod scan;

pub use config::ReceiptConfig;
pub use scan::{ExtractedText, ScanRecord};
