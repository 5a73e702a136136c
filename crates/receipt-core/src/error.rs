//! Error types for the receipt-core library.

use thiserror::Error;

/// Main error type for the receipt library.
#[derive(Error, Debug)]
pub enum ReceiptError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Classified failure of a single extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// No API credential could be resolved.
    #[error("no API credential configured")]
    Unconfigured,

    /// The provider answered but returned no usable text.
    #[error("provider returned no text")]
    EmptyResult,

    /// The credential was rejected or the requested resource does not exist.
    #[error("credential rejected: {message}")]
    Unauthorized { message: String },

    /// Any other failure. `cause` keeps the original error for logs.
    #[error("extraction failed: {cause}")]
    Generic { cause: String },
}

impl ExtractionError {
    /// Coarse kind of this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unconfigured => FailureKind::Unconfigured,
            Self::EmptyResult => FailureKind::EmptyResult,
            Self::Unauthorized { .. } => FailureKind::Unauthorized,
            Self::Generic { .. } => FailureKind::Generic,
        }
    }
}

/// The four failure classes a scan can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unconfigured,
    EmptyResult,
    Unauthorized,
    Generic,
}

impl FailureKind {
    /// Whether this failure should send the user back to credential selection.
    pub fn needs_credential_reselect(self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Errors related to the persisted history slot.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Reading or writing the slot failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The slot contents could not be (de)serialized.
    #[error("invalid history document: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The slot was written by a newer version.
    #[error("unsupported history version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Backend-specific storage failure (e.g. browser storage quota).
    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors related to driving a scan session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A scan is already in flight for this session.
    #[error("a scan is already in progress")]
    Busy,

    /// The session was reset or restarted while this scan was in flight.
    #[error("scan was superseded and its result discarded")]
    Superseded,
}

/// Result type for the receipt library.
pub type Result<T> = std::result::Result<T, ReceiptError>;
