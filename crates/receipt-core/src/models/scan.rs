//! Scan record model.

use std::fmt;
use std::ops::Deref;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExtractionError;

/// Text returned by a successful extraction.
///
/// Always trimmed and never empty, so holding one proves the extraction
/// produced usable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText(String);

impl ExtractedText {
    /// Trim provider output, rejecting it if nothing is left.
    pub fn parse(raw: &str) -> Result<Self, ExtractionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ExtractionError::EmptyResult);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for ExtractedText {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExtractedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One completed extraction, as kept in the history.
///
/// Fields are private: a record is immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    id: String,
    created_at: DateTime<Utc>,
    extracted_text: String,
    image_preview: String,
}

impl ScanRecord {
    /// Create a record for a successful extraction, stamped now.
    pub fn new(text: ExtractedText, image_preview: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            extracted_text: text.into_string(),
            image_preview: image_preview.into(),
        }
    }

    /// Unique identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation instant (UTC).
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Creation instant in local time, for display.
    pub fn display_date(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    /// Full extracted text.
    pub fn extracted_text(&self) -> &str {
        &self.extracted_text
    }

    /// Self-contained data URI of the source image.
    pub fn image_preview(&self) -> &str {
        &self.image_preview
    }

    /// First two non-blank lines joined by ` / `, or `None` if there are none.
    pub fn summary(&self) -> Option<String> {
        let lines: Vec<&str> = self
            .extracted_text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(2)
            .collect();

        if lines.is_empty() {
            None
        } else {
            Some(lines.join(" / "))
        }
    }
}

/// Record layout of the first web release: `{id, date, text, imagePreviewUrl}`,
/// keyed by the ISO timestamp of the scan. Only found in unversioned slots.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LegacyScanRecord {
    id: String,
    text: String,
    #[serde(default)]
    image_preview_url: String,
}

impl From<LegacyScanRecord> for ScanRecord {
    fn from(legacy: LegacyScanRecord) -> Self {
        let created_at = DateTime::parse_from_rfc3339(&legacy.id)
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Self {
            id: legacy.id,
            created_at,
            extracted_text: legacy.text,
            image_preview: legacy.image_preview_url,
        }
    }
}
