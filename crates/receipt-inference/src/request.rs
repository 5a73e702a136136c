//! Wire types for the `generateContent` endpoint.

use serde::{Deserialize, Serialize};

use crate::InferenceError;

/// Request body for a single `generateContent` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation turns. Receipt scans always send exactly one.
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    /// Build a request holding one user message made of `parts`.
    pub fn single_turn(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Author role (`user` or `model`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Ordered message parts.
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A single part of a message: either text or inline binary data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Plain text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Inline base64 payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,

    /// Set by thinking models on reasoning parts, which are not answer text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    /// A text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// An inline data part.
    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
            ..Default::default()
        }
    }
}

/// Base64 payload with its declared media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// Media type, e.g. `image/jpeg`.
    pub mime_type: String,

    /// Standard base64 data, no data-URI prefix.
    pub data: String,
}

/// Response body of `generateContent`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// One generated answer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Build a response holding a single text candidate.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts: vec![Part::text(text)],
                }),
                finish_reason: Some("STOP".to_string()),
            }],
        }
    }

    /// Text of the first candidate, with its non-thought text parts concatenated.
    ///
    /// Returns `None` when there is no candidate or it carries no text part.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;

        let mut found = false;
        let mut text = String::new();
        for part in &content.parts {
            if part.thought == Some(true) {
                continue;
            }
            if let Some(chunk) = &part.text {
                found = true;
                text.push_str(chunk);
            }
        }

        found.then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Turn a non-success response into an [`InferenceError::Api`].
///
/// Google APIs wrap failures as `{"error": {"code", "message", "status"}}`;
/// anything else keeps the raw body as the message.
pub fn parse_error_body(status: u16, body: &str) -> InferenceError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => InferenceError::Api {
            status,
            code: envelope.error.status,
            message: envelope.error.message,
        },
        Err(_) => InferenceError::Api {
            status,
            code: None,
            message: body.trim().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_wire_shape() {
        let request = GenerateContentRequest::single_turn(vec![
            Part::inline_data("image/png", "AAAA"),
            Part::text("read it"),
        ]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "inlineData": { "mimeType": "image/png", "data": "AAAA" } },
                        { "text": "read it" }
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "thinking...", "thought": true },
                        { "text": "MART 24\n" },
                        { "text": "Total: 5.00" }
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;

        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text(), Some("MART 24\nTotal: 5.00".to_string()));
    }

    #[test]
    fn test_response_text_absent() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.text(), None);

        let body = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text(), None);
    }

    #[test]
    fn test_parse_error_body_envelope() {
        let body = r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#;

        match parse_error_body(404, body) {
            InferenceError::Api { status, code, message } => {
                assert_eq!(status, 404);
                assert_eq!(code.as_deref(), Some("NOT_FOUND"));
                assert_eq!(message, "Requested entity was not found.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_body_raw() {
        let err = parse_error_body(502, "  Bad Gateway\n");
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.code(), None);
        assert_eq!(err.to_string(), "provider returned 502: Bad Gateway");
    }
}
