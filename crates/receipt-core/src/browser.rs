//! Read-only list/detail view over the history.

use serde::Serialize;

use crate::history::HistoryStore;
use crate::messages::Locale;
use crate::models::scan::ScanRecord;

/// One row of the history list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// 1-based position, newest first.
    pub position: usize,
    pub id: String,
    /// Local creation time for display.
    pub date: String,
    /// First two non-blank lines, or a placeholder.
    pub summary: String,
}

/// How a user points at a history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// 1-based position in the newest-first list.
    Position(usize),
    /// Record id.
    Id(String),
}

impl Selector {
    /// Numbers are positions, anything else is an id.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match input.parse::<usize>() {
            Ok(position) => Self::Position(position),
            Err(_) => Self::Id(input.to_string()),
        }
    }
}

/// Browser over a borrowed list of records.
pub struct HistoryBrowser<'a> {
    records: &'a [ScanRecord],
    locale: Locale,
}

impl<'a> HistoryBrowser<'a> {
    pub fn new(records: &'a [ScanRecord], locale: Locale) -> Self {
        Self { records, locale }
    }

    /// Browse the records of a store.
    pub fn over<H: HistoryStore + ?Sized>(store: &'a H, locale: Locale) -> Self {
        Self::new(store.load(), locale)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// List rows, newest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, record)| HistoryEntry {
                position: i + 1,
                id: record.id().to_string(),
                date: record.display_date(),
                summary: record
                    .summary()
                    .unwrap_or_else(|| self.locale.no_extracted_text().to_string()),
            })
            .collect()
    }

    /// Record with the given id.
    pub fn get(&self, id: &str) -> Option<&'a ScanRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    /// Record at a 1-based position.
    pub fn nth(&self, position: usize) -> Option<&'a ScanRecord> {
        position.checked_sub(1).and_then(|i| self.records.get(i))
    }

    /// Resolve a selector.
    pub fn select(&self, selector: &Selector) -> Option<&'a ScanRecord> {
        match selector {
            Selector::Position(position) => self.nth(*position),
            Selector::Id(id) => self.get(id),
        }
    }
}
