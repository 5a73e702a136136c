//! Gemini backend over the browser `fetch` API.

use async_trait::async_trait;
use tracing::{debug, info};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, RequestMode, Response};

use crate::request::parse_error_body;
use crate::{
    GenerateContentRequest, GenerateContentResponse, InferenceError, Result, DEFAULT_BASE_URL,
};

use super::VisionBackend;

/// Gemini backend using `window.fetch`.
#[derive(Debug, Clone)]
pub struct FetchBackend {
    base_url: String,
}

impl FetchBackend {
    /// Create a backend against the public endpoint.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
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

impl Default for FetchBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn transport(err: JsValue) -> InferenceError {
    InferenceError::Transport(err.as_string().unwrap_or_else(|| format!("{:?}", err)))
}

#[async_trait(?Send)]
impl VisionBackend for FetchBackend {
    async fn generate_content(
        &self,
        api_key: &str,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        info!("Sending generateContent request to {}", model);

        let body = serde_json::to_string(request)
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let headers = Headers::new().map_err(transport)?;
        headers
            .set("Content-Type", "application/json")
            .map_err(transport)?;
        headers.set("x-goog-api-key", api_key).map_err(transport)?;

        let init = RequestInit::new();
        init.set_method("POST");
        init.set_mode(RequestMode::Cors);
        init.set_headers(&headers);
        init.set_body(&JsValue::from_str(&body));

        let request =
            Request::new_with_str_and_init(&self.endpoint(model), &init).map_err(transport)?;
        let window =
            web_sys::window().ok_or_else(|| InferenceError::Transport("no window".to_string()))?;

        let response: Response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(transport)?
            .dyn_into()
            .map_err(transport)?;

        let status = response.status();
        let text = JsFuture::from(response.text().map_err(transport)?)
            .await
            .map_err(transport)?
            .as_string()
            .unwrap_or_default();

        if !response.ok() {
            return Err(parse_error_body(status, &text));
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|e| InferenceError::Decode(e.to_string()))?;
        debug!("generateContent returned {} candidates", parsed.candidates.len());

        Ok(parsed)
    }

    fn name(&self) -> &str {
        "fetch"
    }
}
