//! Persisted scan history.
//!
//! The history is one named slot holding a JSON document with the scans
//! newest first. The slot is read once when the store is opened and
//! rewritten in full on every append.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::HistoryError;
use crate::models::scan::{LegacyScanRecord, ScanRecord};

/// Name of the history slot.
pub const HISTORY_SLOT: &str = "receipt-history";

/// Current document version.
pub const HISTORY_VERSION: u32 = 1;

/// Ordered store of completed scans, newest first.
pub trait HistoryStore: Send {
    /// All records, newest first.
    fn load(&self) -> &[ScanRecord];

    /// Insert a record at the front and persist the list.
    ///
    /// The record stays in the in-memory list even when persisting fails.
    fn append(&mut self, record: ScanRecord) -> Result<(), HistoryError>;

    fn len(&self) -> usize {
        self.load().len()
    }

    fn is_empty(&self) -> bool {
        self.load().is_empty()
    }
}

impl<H: HistoryStore + ?Sized> HistoryStore for Box<H> {
    fn load(&self) -> &[ScanRecord] {
        (**self).load()
    }

    fn append(&mut self, record: ScanRecord) -> Result<(), HistoryError> {
        (**self).append(record)
    }
}

/// Raw storage for the serialized history document.
pub trait HistorySlot {
    /// Slot contents, or `None` if the slot was never written.
    fn read(&self) -> Result<Option<String>, HistoryError>;

    /// Replace the slot contents.
    fn write(&mut self, contents: &str) -> Result<(), HistoryError>;
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    scans: &'a [ScanRecord],
}

#[derive(Deserialize)]
struct Document {
    scans: Vec<ScanRecord>,
}

/// Element of an unversioned slot: either this crate's record or the
/// web app's original layout.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Current(ScanRecord),
    Legacy(LegacyScanRecord),
}

impl From<StoredRecord> for ScanRecord {
    fn from(stored: StoredRecord) -> Self {
        match stored {
            StoredRecord::Current(record) => record,
            StoredRecord::Legacy(legacy) => legacy.into(),
        }
    }
}

/// Serialize records into the current document format.
pub fn encode_document(records: &[ScanRecord]) -> Result<String, HistoryError> {
    let document = DocumentRef {
        version: HISTORY_VERSION,
        scans: records,
    };
    Ok(serde_json::to_string(&document)?)
}

/// Parse a history document.
///
/// Accepts the versioned form and a bare JSON array (version 0). Version 0
/// elements may use the original `{id, date, text, imagePreviewUrl}` layout.
pub fn decode_document(contents: &str) -> Result<Vec<ScanRecord>, HistoryError> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_json::Value = serde_json::from_str(contents)?;
    if value.is_array() {
        let stored: Vec<StoredRecord> = serde_json::from_value(value)?;
        return Ok(stored.into_iter().map(ScanRecord::from).collect());
    }

    let found = value
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);
    if found > u64::from(HISTORY_VERSION) {
        return Err(HistoryError::UnsupportedVersion {
            found: u32::try_from(found).unwrap_or(u32::MAX),
            supported: HISTORY_VERSION,
        });
    }

    let document: Document = serde_json::from_value(value)?;
    Ok(document.scans)
}

/// History over any [`HistorySlot`].
pub struct SlotHistory<S: HistorySlot> {
    slot: S,
    records: Vec<ScanRecord>,
}

impl<S: HistorySlot> SlotHistory<S> {
    /// Read the slot and open the history.
    pub fn open(slot: S) -> Result<Self, HistoryError> {
        let records = match slot.read()? {
            Some(contents) => decode_document(&contents)?,
            None => Vec::new(),
        };
        debug!("Loaded {} history records", records.len());
        Ok(Self { slot, records })
    }

    /// Underlying slot.
    pub fn slot(&self) -> &S {
        &self.slot
    }
}

impl<S: HistorySlot + Send> HistoryStore for SlotHistory<S> {
    fn load(&self) -> &[ScanRecord] {
        &self.records
    }

    fn append(&mut self, record: ScanRecord) -> Result<(), HistoryError> {
        info!("Saving scan {} to history", record.id());
        self.records.insert(0, record);
        let contents = encode_document(&self.records)?;
        self.slot.write(&contents)
    }
}

/// Slot backed by a JSON file, written atomically.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistorySlot for FileSlot {
    fn read(&self) -> Result<Option<String>, HistoryError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, contents: &str) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Slot kept in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    contents: Option<String>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot pre-filled with `contents`.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Some(contents.into()),
        }
    }

    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }
}

impl HistorySlot for MemorySlot {
    fn read(&self) -> Result<Option<String>, HistoryError> {
        Ok(self.contents.clone())
    }

    fn write(&mut self, contents: &str) -> Result<(), HistoryError> {
        self.contents = Some(contents.to_string());
        Ok(())
    }
}

/// File-backed history.
pub type FileHistory = SlotHistory<FileSlot>;

/// In-memory history.
pub type MemoryHistory = SlotHistory<MemorySlot>;

impl FileHistory {
    /// Open the history stored at `path`.
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        Self::open(FileSlot::new(path))
    }
}

impl MemoryHistory {
    /// An empty in-memory history.
    pub fn empty() -> Self {
        Self {
            slot: MemorySlot::new(),
            records: Vec::new(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Slot that starts empty and refuses every write.
    #[derive(Debug, Default)]
    pub struct BrokenSlot;

    impl HistorySlot for BrokenSlot {
        fn read(&self) -> Result<Option<String>, HistoryError> {
            Ok(None)
        }

        fn write(&mut self, _contents: &str) -> Result<(), HistoryError> {
            Err(HistoryError::Storage("quota exceeded".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::scan::ExtractedText;
    use pretty_assertions::assert_eq;

    fn record(text: &str) -> ScanRecord {
        ScanRecord::new(ExtractedText::parse(text).unwrap(), "data:image/png;base64,AA==")
    }

    #[test]
    fn test_append_newest_first() {
        let mut history = MemoryHistory::empty();
        history.append(record("first")).unwrap();
        history.append(record("second")).unwrap();

        let texts: Vec<&str> = history.load().iter().map(|r| r.extracted_text()).collect();
        assert_eq!(texts, vec!["second", "first"]);
    }

    #[test]
    fn test_no_dedup() {
        let mut history = MemoryHistory::empty();
        history.append(record("same")).unwrap();
        history.append(record("same")).unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_document_is_versioned() {
        let mut history = MemoryHistory::empty();
        history.append(record("x")).unwrap();

        let contents = history.slot().contents().unwrap();
        let value: serde_json::Value = serde_json::from_str(contents).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["scans"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_bare_array_is_read_and_upgraded() {
        let old = record("legacy");
        let contents = serde_json::to_string(&vec![old.clone()]).unwrap();

        let mut history = SlotHistory::open(MemorySlot::with_contents(contents)).unwrap();
        assert_eq!(history.load(), &[old]);

        history.append(record("new")).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(history.slot().contents().unwrap()).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["scans"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_web_app_records_are_read() {
        let contents = r#"[
            {"id":"2025-01-02T09:30:00.000Z","date":"2025. 1. 2. 오후 6:30:00","text":"CAFE\nTotal: 4.50","imagePreviewUrl":"data:image/jpeg;base64,/9j/"},
            {"id":"2025-01-01T10:00:00.000Z","date":"2025. 1. 1. 오후 7:00:00","text":"Total: 5.00","imagePreviewUrl":"data:image/png;base64,iVBO"}
        ]"#;

        let mut history = SlotHistory::open(MemorySlot::with_contents(contents)).unwrap();
        let records = history.load();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), "2025-01-02T09:30:00.000Z");
        assert_eq!(records[0].extracted_text(), "CAFE\nTotal: 4.50");
        assert_eq!(records[0].image_preview(), "data:image/jpeg;base64,/9j/");
        assert_eq!(
            records[1].created_at().to_rfc3339(),
            "2025-01-01T10:00:00+00:00"
        );

        history.append(record("new")).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(history.slot().contents().unwrap()).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["scans"][1]["extractedText"], "CAFE\nTotal: 4.50");
        assert_eq!(value["scans"][2]["createdAt"], "2025-01-01T10:00:00Z");
    }

    #[test]
    fn test_web_app_record_without_timestamp_id() {
        let contents = r#"[{"id":"scan-1","date":"yesterday","text":"Total: 1.00","imagePreviewUrl":""}]"#;

        let before = chrono::Utc::now();
        let records = decode_document(contents).unwrap();
        assert_eq!(records[0].id(), "scan-1");
        assert!(records[0].created_at() >= before);
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = decode_document(r#"{"version": 7, "scans": []}"#).unwrap_err();
        assert!(matches!(
            err,
            HistoryError::UnsupportedVersion { found: 7, supported: 1 }
        ));
    }

    #[test]
    fn test_blank_slot_is_empty() {
        assert!(decode_document("").unwrap().is_empty());
        assert!(decode_document("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_slot_is_error() {
        assert!(matches!(
            decode_document("{not json"),
            Err(HistoryError::Serialize(_))
        ));
    }

    #[test]
    fn test_file_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("receipt-history.json");

        let mut history = FileHistory::open_path(&path).unwrap();
        assert!(history.is_empty());
        history.append(record("Total: 5.00")).unwrap();
        history.append(record("Total: 7.25")).unwrap();

        let reopened = FileHistory::open_path(&path).unwrap();
        let texts: Vec<&str> = reopened.load().iter().map(|r| r.extracted_text()).collect();
        assert_eq!(texts, vec!["Total: 7.25", "Total: 5.00"]);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
