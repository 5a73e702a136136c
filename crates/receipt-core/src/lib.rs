//! Core library for receipt scanning.
//!
//! This crate provides:
//! - Image encoding for transport (base64 + media type)
//! - The extraction client that sends a receipt to a hosted vision model
//! - A scan session controller with an explicit state machine
//! - The persisted, newest-first scan history and a read-only browser over it

pub mod browser;
pub mod client;
pub mod encoder;
pub mod error;
pub mod history;
pub mod messages;
pub mod models;
pub mod session;

pub use browser::{HistoryBrowser, HistoryEntry, Selector};
pub use client::{
    build_request, classify, classify_message, CredentialSource, EnvCredentials,
    ExtractionClient, StaticCredential, EXTRACTION_PROMPT, MODEL,
};
pub use encoder::{encode, EncodedImage, ImageFile};
pub use error::{
    ExtractionError, FailureKind, HistoryError, ReceiptError, Result, SessionError,
};
pub use history::{
    FileHistory, FileSlot, HistorySlot, HistoryStore, MemoryHistory, MemorySlot, SlotHistory,
    HISTORY_SLOT,
};
pub use messages::Locale;
pub use models::{ExtractedText, ReceiptConfig, ScanRecord};
pub use session::{
    Completion, SessionEvent, SessionMachine, SessionOptions, SessionState, Ticket,
};
#[cfg(feature = "native")]
pub use session::ScanSession;

/// Re-export provider types.
pub use receipt_inference::{
    GenerateContentRequest, GenerateContentResponse, InferenceError, VisionBackend,
};

#[cfg(feature = "native")]
pub use receipt_inference::GeminiBackend;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use receipt_inference::FetchBackend;
