//! Vision backend implementations.

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub mod fetch;
#[cfg(feature = "native")]
pub mod gemini;

use async_trait::async_trait;

use crate::{GenerateContentRequest, GenerateContentResponse, Result};

/// Trait for hosted vision/language model backends.
///
/// This trait abstracts over the transport so the extraction pipeline can run
/// against the real HTTP API natively and against scripted backends in tests.
/// Browser futures are not `Send`, so on wasm32 the returned future is not
/// required to be either.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait VisionBackend: Send + Sync {
    /// Run one `generateContent` call.
    ///
    /// # Arguments
    /// * `api_key` - Credential resolved for this call
    /// * `model` - Model identifier, e.g. `gemini-2.5-flash`
    /// * `request` - Request body
    async fn generate_content(
        &self,
        api_key: &str,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}
