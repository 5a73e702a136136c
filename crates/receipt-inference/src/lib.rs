//! Vision model client layer for receipt-scan.
//!
//! This crate provides:
//! - Wire types for the `generateContent` request/response
//! - The [`VisionBackend`] trait the extraction pipeline talks to
//! - `GeminiBackend`, an HTTP implementation over `reqwest` (native only)
//! - `FetchBackend`, the same calls over the browser `fetch` API (wasm32 only)

mod backend;
mod error;
mod request;

pub use backend::VisionBackend;
pub use error::InferenceError;
pub use request::{
    parse_error_body, Candidate, Content, GenerateContentRequest, GenerateContentResponse,
    InlineData, Part,
};

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use backend::fetch::FetchBackend;
#[cfg(feature = "native")]
pub use backend::gemini::GeminiBackend;

/// Default endpoint of the Generative Language API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
