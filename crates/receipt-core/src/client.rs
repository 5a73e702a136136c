//! Extraction client: one vision-model call per scan.

use receipt_inference::{GenerateContentRequest, InferenceError, Part, VisionBackend};
use tracing::{debug, error, info};

use crate::encoder::{encode, EncodedImage, ImageFile};
use crate::error::{ExtractionError, FailureKind};
use crate::models::config::ExtractionConfig;
use crate::models::scan::ExtractedText;

/// Model used for every extraction.
pub const MODEL: &str = "gemini-2.5-flash";

/// Instruction sent alongside every image.
pub const EXTRACTION_PROMPT: &str = "Extract all text from this receipt. Present it as a single block of text with line breaks where appropriate. Do not add any formatting like markdown or headers.";

/// Secondary environment variable checked after the configured one.
pub const FALLBACK_KEY_ENV: &str = "GEMINI_API_KEY";

/// Provider message fragments that mean the credential must be reselected.
const CREDENTIAL_MARKERS: &[&str] = &["entity was not found", "API key not valid"];

/// Provider status strings that mean the credential must be reselected.
const CREDENTIAL_CODES: &[&str] = &["UNAUTHENTICATED", "PERMISSION_DENIED", "NOT_FOUND"];

/// Resolves the API credential at call time.
pub trait CredentialSource: Send + Sync {
    /// The credential, or `None` if none is available right now.
    fn resolve(&self) -> Option<String>;

    /// Human-readable description of where the credential came from.
    fn describe(&self) -> Option<String> {
        None
    }
}

/// A fixed credential (or the explicit absence of one).
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(pub Option<String>);

impl CredentialSource for StaticCredential {
    fn resolve(&self) -> Option<String> {
        non_empty(self.0.as_deref())
    }
}

/// Environment variables first, then a stored key.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    vars: Vec<String>,
    stored: Option<String>,
}

impl EnvCredentials {
    pub fn new(vars: Vec<String>, stored: Option<String>) -> Self {
        Self { vars, stored }
    }

    /// Sources described by the extraction config.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let mut vars = vec![config.api_key_env.clone()];
        if config.api_key_env != FALLBACK_KEY_ENV {
            vars.push(FALLBACK_KEY_ENV.to_string());
        }
        Self::new(vars, config.api_key.clone())
    }

    fn lookup(&self) -> Option<(String, String)> {
        for var in &self.vars {
            if let Some(value) = non_empty(std::env::var(var).ok().as_deref()) {
                return Some((value, format!("environment variable {var}")));
            }
        }
        non_empty(self.stored.as_deref()).map(|value| (value, "config file".to_string()))
    }
}

impl CredentialSource for EnvCredentials {
    fn resolve(&self) -> Option<String> {
        self.lookup().map(|(value, _)| value)
    }

    fn describe(&self) -> Option<String> {
        self.lookup().map(|(_, source)| source)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Client that turns a receipt image into text.
pub struct ExtractionClient<B: VisionBackend> {
    backend: B,
    credentials: Box<dyn CredentialSource>,
}

impl<B: VisionBackend> ExtractionClient<B> {
    /// Create a client over `backend`.
    pub fn new(backend: B, credentials: impl CredentialSource + 'static) -> Self {
        Self {
            backend,
            credentials: Box::new(credentials),
        }
    }

    /// Whether a credential is resolvable right now.
    pub fn is_configured(&self) -> bool {
        self.credentials.resolve().is_some()
    }

    /// Extract the text of a receipt image.
    ///
    /// Makes at most one provider call and never retries.
    pub async fn extract(&self, image: &ImageFile) -> Result<ExtractedText, ExtractionError> {
        let Some(api_key) = self.credentials.resolve() else {
            info!("No API credential available, skipping provider call");
            return Err(ExtractionError::Unconfigured);
        };

        let encoded = encode(image);
        self.extract_encoded(&api_key, &encoded).await
    }

    async fn extract_encoded(
        &self,
        api_key: &str,
        encoded: &EncodedImage,
    ) -> Result<ExtractedText, ExtractionError> {
        let request = build_request(encoded);
        debug!(
            "Requesting extraction via {} ({} base64 bytes, {})",
            self.backend.name(),
            encoded.data.len(),
            encoded.mime_type
        );

        let response = self
            .backend
            .generate_content(api_key, MODEL, &request)
            .await
            .map_err(|e| {
                let classified = classify(&e);
                error!("Error extracting text from image: {}", e);
                classified
            })?;

        match response.text() {
            Some(text) => ExtractedText::parse(&text),
            None => Err(ExtractionError::EmptyResult),
        }
    }
}

/// The provider request for one encoded image: image part, then instruction.
pub fn build_request(encoded: &EncodedImage) -> GenerateContentRequest {
    GenerateContentRequest::single_turn(vec![
        Part::inline_data(encoded.mime_type.clone(), encoded.data.clone()),
        Part::text(EXTRACTION_PROMPT),
    ])
}

/// Classify a provider failure.
pub fn classify(err: &InferenceError) -> ExtractionError {
    let message = err.to_string();

    let rejected_status = matches!(err.status(), Some(401 | 403 | 404));
    let rejected_code = err.code().is_some_and(|c| CREDENTIAL_CODES.contains(&c));

    if rejected_status || rejected_code || is_credential_rejection(&message) {
        ExtractionError::Unauthorized { message }
    } else {
        ExtractionError::Generic { cause: message }
    }
}

/// Classify a bare provider error message.
pub fn classify_message(message: &str) -> FailureKind {
    if is_credential_rejection(message) {
        FailureKind::Unauthorized
    } else {
        FailureKind::Generic
    }
}

/// Whether a provider message says the credential was rejected.
pub fn is_credential_rejection(message: &str) -> bool {
    CREDENTIAL_MARKERS.iter().any(|marker| message.contains(marker))
}
