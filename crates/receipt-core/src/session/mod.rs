//! Scan session state machine.
//!
//! A session drives one scan at a time through
//! `Idle -> Loading -> Result | Failed`. Every scan and every reset bumps the
//! session generation; a response or timer that belongs to an older
//! generation is dropped instead of being applied.
//!
//! [`SessionMachine`] holds the transitions and knows nothing about the
//! runtime. Hosts own the extraction call and the reselect timer:
//! [`ScanSession`] drives it on tokio, the browser bindings on the JS event
//! loop.

#[cfg(feature = "native")]
mod controller;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, FailureKind, HistoryError, SessionError};
use crate::history::HistoryStore;
use crate::messages::Locale;
use crate::models::config::ReceiptConfig;
use crate::models::scan::{ExtractedText, ScanRecord};

#[cfg(feature = "native")]
pub use controller::ScanSession;

/// Current state of a scan session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// No image selected.
    Idle,
    /// Request in flight. The preview is already displayable.
    Loading { preview: String },
    /// Text extracted and saved.
    Result { preview: String, text: String },
    /// Extraction failed with a user-facing message.
    Failed {
        preview: String,
        kind: FailureKind,
        message: String,
    },
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// Data URI of the selected image, once one is selected.
    pub fn preview(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Loading { preview }
            | Self::Result { preview, .. }
            | Self::Failed { preview, .. } => Some(preview),
        }
    }

    /// Extracted text, in the `Result` state.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Result { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Failure kind, in the `Failed` state.
    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Self::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Notifications for the session host.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A scan succeeded and its record was handed to the history.
    ScanCompleted(ScanRecord),
    /// The record is in the in-memory history but could not be persisted.
    HistoryNotSaved { message: String },
    /// The credential was rejected; the host should ask for a new one.
    CredentialReselectRequested,
}

/// Session tunables.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub locale: Locale,
    pub reselect_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            reselect_delay: Duration::from_millis(2000),
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &ReceiptConfig) -> Self {
        Self {
            locale: config.ui.locale,
            reselect_delay: Duration::from_millis(config.session.reselect_delay_ms),
        }
    }
}

/// Proof that a piece of work was started in a given session generation.
///
/// Tickets are cheap to clone and can be moved into timers; a ticket stops
/// being current as soon as the session is reset or a new scan starts.
#[derive(Debug, Clone)]
pub struct Ticket {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the session is still in the generation this ticket was issued in.
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

/// What a finished scan produced.
#[derive(Debug)]
pub struct Completion {
    /// State the session moved to.
    pub state: SessionState,
    /// The record handed to the history, on success.
    pub saved: Option<ScanRecord>,
    /// Set when the record could not be persisted.
    pub history_error: Option<HistoryError>,
    /// Set when the host should raise the credential reselect signal once
    /// the reselect delay has elapsed and the ticket is still current.
    pub reselect: Option<Ticket>,
}

/// Runtime-independent scan state machine.
#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    generation: Arc<AtomicU64>,
    locale: Locale,
}

impl SessionMachine {
    pub fn new(locale: Locale) -> Self {
        Self {
            state: SessionState::Idle,
            generation: Arc::new(AtomicU64::new(0)),
            locale,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Enter `Loading` for a newly selected image.
    ///
    /// Fails with [`SessionError::Busy`] while another scan is in flight.
    pub fn begin(&mut self, preview: String) -> Result<Ticket, SessionError> {
        if self.state.is_loading() {
            return Err(SessionError::Busy);
        }
        self.state = SessionState::Loading { preview };
        Ok(self.advance())
    }

    /// Apply the outcome of the extraction started with `ticket`.
    ///
    /// On success the record goes to `history`; a failed write leaves it in
    /// memory and is reported in [`Completion::history_error`]. Fails with
    /// [`SessionError::Superseded`] if the session moved on in the meantime.
    pub fn finish<H: HistoryStore + ?Sized>(
        &mut self,
        ticket: &Ticket,
        outcome: Result<ExtractedText, ExtractionError>,
        history: &mut H,
    ) -> Result<Completion, SessionError> {
        if !ticket.is_current() {
            debug!("Discarding response for superseded scan {}", ticket.generation);
            return Err(SessionError::Superseded);
        }

        let preview = self.state.preview().unwrap_or_default().to_string();
        let mut completion = Completion {
            state: SessionState::Idle,
            saved: None,
            history_error: None,
            reselect: None,
        };

        match outcome {
            Ok(text) => {
                let record = ScanRecord::new(text, preview.clone());
                completion.state = SessionState::Result {
                    preview,
                    text: record.extracted_text().to_string(),
                };

                if let Err(e) = history.append(record.clone()) {
                    warn!("Failed to persist history: {}", e);
                    completion.history_error = Some(e);
                }
                completion.saved = Some(record);
            }
            Err(err) => {
                let kind = err.kind();
                info!("Scan failed: {}", err);
                completion.state = SessionState::Failed {
                    preview,
                    kind,
                    message: self.locale.failure_message(kind).to_string(),
                };

                if kind.needs_credential_reselect() {
                    completion.reselect = Some(ticket.clone());
                }
            }
        }

        self.state = completion.state.clone();
        Ok(completion)
    }

    /// Return to `Idle`. Outstanding tickets stop being current.
    pub fn reset(&mut self) {
        self.advance();
        self.state = SessionState::Idle;
        debug!("Session reset");
    }

    fn advance(&self) -> Ticket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket {
            generation,
            current: Arc::clone(&self.generation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{MemoryHistory, SlotHistory};
    use crate::history::testing::BrokenSlot;
    use pretty_assertions::assert_eq;

    fn text(raw: &str) -> Result<ExtractedText, ExtractionError> {
        ExtractedText::parse(raw)
    }

    #[test]
    fn test_begin_while_loading_is_busy() {
        let mut machine = SessionMachine::new(Locale::En);
        machine.begin("data:a".into()).unwrap();
        assert_eq!(machine.begin("data:b".into()).unwrap_err(), SessionError::Busy);
        assert_eq!(machine.state().preview(), Some("data:a"));
    }

    #[test]
    fn test_finish_after_reset_is_superseded() {
        let mut machine = SessionMachine::new(Locale::En);
        let mut history = MemoryHistory::empty();

        let ticket = machine.begin("data:a".into()).unwrap();
        machine.reset();
        assert!(!ticket.is_current());

        let result = machine.finish(&ticket, text("late"), &mut history);
        assert_eq!(result.unwrap_err(), SessionError::Superseded);
        assert_eq!(machine.state(), &SessionState::Idle);
        assert!(history.is_empty());
    }

    #[test]
    fn test_unauthorized_hands_back_reselect_ticket() {
        let mut machine = SessionMachine::new(Locale::En);
        let mut history = MemoryHistory::empty();

        let ticket = machine.begin("data:a".into()).unwrap();
        let outcome = Err(ExtractionError::Unauthorized {
            message: "Requested entity was not found.".into(),
        });
        let completion = machine.finish(&ticket, outcome, &mut history).unwrap();

        let reselect = completion.reselect.unwrap();
        assert!(reselect.is_current());
        machine.begin("data:b".into()).unwrap();
        assert!(!reselect.is_current());
    }

    #[test]
    fn test_failed_write_keeps_record_in_memory() {
        let mut machine = SessionMachine::new(Locale::En);
        let mut history = SlotHistory::open(BrokenSlot).unwrap();

        let ticket = machine.begin("data:a".into()).unwrap();
        let completion = machine.finish(&ticket, text(" Total: 2.00 "), &mut history).unwrap();

        assert_eq!(completion.state.text(), Some("Total: 2.00"));
        assert!(matches!(completion.history_error, Some(HistoryError::Storage(_))));
        assert_eq!(history.len(), 1);
        assert_eq!(history.load()[0].extracted_text(), "Total: 2.00");
    }
}
