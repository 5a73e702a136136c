//! Gemini backend over the public REST API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::request::parse_error_body;
use crate::{
    GenerateContentRequest, GenerateContentResponse, InferenceError, Result, DEFAULT_BASE_URL,
};

use super::VisionBackend;

/// Gemini backend using `reqwest`.
pub struct GeminiBackend {
    client: Client,
    base_url: String,
}

impl GeminiBackend {
    /// Create a backend against the public endpoint with transport defaults.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create a backend with a request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the backend at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Endpoint URL for `model`.
    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

impl Default for GeminiBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl VisionBackend for GeminiBackend {
    async fn generate_content(
        &self,
        api_key: &str,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let start = Instant::now();
        info!("Sending generateContent request to {}", model);

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error_body(status.as_u16(), &body));
        }

        let body = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| InferenceError::Decode(e.to_string()))?;

        debug!(
            "generateContent returned {} candidates in {}ms",
            parsed.candidates.len(),
            start.elapsed().as_millis()
        );

        Ok(parsed)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_endpoint() {
        let backend = GeminiBackend::new();
        assert_eq!(
            backend.endpoint("gemini-2.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = GeminiBackend::new().with_base_url("http://localhost:8080/v1beta/");
        assert_eq!(
            backend.endpoint("m"),
            "http://localhost:8080/v1beta/models/m:generateContent"
        );
    }
}
