//! Generative-model boundary: build the request, send it, read the answer.
//!
//! This module turns the ingested content bundle into one `generateContent`
//! call and returns the model's Markdown as plain text. It is intentionally
//! thin: all prompt wording lives in [`crate::prompts`] so it can change
//! without touching transport or parsing logic here.
//!
//! ## Why a transport trait
//!
//! [`ModelTransport`] is the only seam with network I/O. [`crate::compile::compile`] and the
//! CLI are generic over it, so tests drive the whole pipeline with a canned
//! transport and never open a socket.
//!
//! ## Tolerant parsing
//!
//! Response bodies are read through an ordered list of extractors (Gemini
//! `candidates`, OpenAI-style `choices`, a bare `text` field). The first one
//! yielding non-empty text wins; if none does, the caller gets
//! [`NO_CONTENT`] rather than an error. Transport failures are likewise turned
//! into text prefixed with [`ERROR_PREFIX`], so [`generate_notes`] always has
//! something to show.

use crate::config::AppConfig;
use crate::error::{NotesError, TransportError};
use crate::pipeline::encode::ImagePart;
use crate::prompts::build_prompt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Prefix marking output text that reports a failed model call.
pub const ERROR_PREFIX: &str = "Error: ";

/// Returned when no extractor finds any text in a response body.
pub const NO_CONTENT: &str = "No content generated.";

// ── Request shape ────────────────────────────────────────────────────────

/// Owned snapshot of everything sent to the model for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
}

/// An ordered list of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

/// One request part: prompt text or an inline image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: ImagePart,
    },
}

impl ModelRequest {
    /// Number of inline images carried by the request.
    pub fn image_count(&self) -> usize {
        self.contents
            .iter()
            .flat_map(|c| &c.parts)
            .filter(|p| matches!(p, Part::InlineData { .. }))
            .count()
    }
}

/// Build the request: the prompt text first, then every image in order.
pub fn build_request(
    instructions: &str,
    raw_text: &str,
    images: &[ImagePart],
    system_instruction: &str,
) -> ModelRequest {
    let mut parts = Vec::with_capacity(images.len() + 1);
    parts.push(Part::Text {
        text: build_prompt(instructions, raw_text),
    });
    parts.extend(images.iter().cloned().map(|inline_data| Part::InlineData { inline_data }));

    ModelRequest {
        contents: vec![Content { parts }],
        system_instruction: Content {
            parts: vec![Part::Text {
                text: system_instruction.to_string(),
            }],
        },
    }
}

// ── Transport ────────────────────────────────────────────────────────────

/// Sends a [`ModelRequest`] and returns the raw JSON response body.
pub trait ModelTransport: Send + Sync {
    fn send(
        &self,
        request: &ModelRequest,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

/// reqwest-backed transport for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
    timeout_secs: u64,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl GeminiClient {
    /// Create a client from config. Fails when no API key is configured.
    pub fn new(config: &AppConfig) -> Result<Self, NotesError> {
        let api_key = config.require_api_key()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| NotesError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// Endpoint URL without the key query parameter.
    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    fn map_send_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

impl ModelTransport for GeminiClient {
    async fn send(&self, request: &ModelRequest) -> Result<Value, TransportError> {
        debug!("POST {} ({} images)", self.endpoint(), request.image_count());

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::InvalidBody(e.to_string()))
    }
}

// ── Response parsing ─────────────────────────────────────────────────────

type Extractor = fn(&Value) -> Option<String>;

/// Tried in order; the first non-empty result wins.
const EXTRACTORS: &[(&str, Extractor)] = &[
    ("candidates", from_candidates),
    ("choices", from_choices),
    ("text", from_text_field),
];

/// Gemini: concatenated text parts of the first candidate.
fn from_candidates(body: &Value) -> Option<String> {
    let parts = body.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}

/// OpenAI-compatible chat completion.
fn from_choices(body: &Value) -> Option<String> {
    body.pointer("/choices/0/message/content")?
        .as_str()
        .map(str::to_string)
}

fn from_text_field(body: &Value) -> Option<String> {
    body.get("text")?.as_str().map(str::to_string)
}

/// Pull the answer text out of a response body of any supported shape.
pub fn extract_text(body: &Value) -> String {
    for (name, extract) in EXTRACTORS {
        if let Some(text) = extract(body).filter(|t| !t.trim().is_empty()) {
            debug!("Response text found via '{}' ({} chars)", name, text.len());
            return text;
        }
    }
    warn!("Response body had no recognisable text");
    NO_CONTENT.to_string()
}

/// `true` when `text` reports a failed model call.
pub fn is_error_text(text: &str) -> bool {
    text.starts_with(ERROR_PREFIX)
}

/// Run one model call and return its text.
///
/// Never fails: transport errors come back as `"Error: <detail>"`.
pub async fn generate_notes<T: ModelTransport>(transport: &T, request: &ModelRequest) -> String {
    let start = Instant::now();
    match transport.send(request).await {
        Ok(body) => {
            let text = extract_text(&body);
            info!("Model answered in {:?} ({} chars)", start.elapsed(), text.len());
            text
        }
        Err(e) => {
            warn!("Model call failed after {:?}: {}", start.elapsed(), e);
            format!("{ERROR_PREFIX}{e}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Canned(Result<Value, u16>);

    impl ModelTransport for Canned {
        async fn send(&self, _request: &ModelRequest) -> Result<Value, TransportError> {
            match &self.0 {
                Ok(v) => Ok(v.clone()),
                Err(status) => Err(TransportError::Status {
                    status: *status,
                    body: "quota exceeded".into(),
                }),
            }
        }
    }

    fn jpeg_part(data: &str) -> ImagePart {
        ImagePart {
            mime_type: "image/jpeg".into(),
            data: data.into(),
        }
    }

    #[test]
    fn request_wire_shape() {
        let req = build_request("be brief", "raw", &[jpeg_part("AAA"), jpeg_part("BBB")], "SYS");
        let v = serde_json::to_value(&req).unwrap();

        let parts = v["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert!(parts[0]["text"].as_str().unwrap().contains("User Instructions: be brief"));
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "AAA");
        assert_eq!(parts[2]["inlineData"]["data"], "BBB");
        assert_eq!(v["systemInstruction"]["parts"][0]["text"], "SYS");
        assert_eq!(req.image_count(), 2);
    }

    #[test]
    fn gemini_candidate_text() {
        let body = json!({"candidates":[{"content":{"parts":[{"text":"## A"},{"text":"\nbody"}]}}]});
        assert_eq!(extract_text(&body), "## A\nbody");
    }

    #[test]
    fn choices_shape_is_accepted() {
        let body = json!({"choices":[{"message":{"content":"## From chat"}}]});
        assert_eq!(extract_text(&body), "## From chat");
    }

    #[test]
    fn bare_text_field_is_accepted() {
        assert_eq!(extract_text(&json!({"text":"plain"})), "plain");
    }

    #[test]
    fn empty_candidate_falls_through_to_later_shapes() {
        let body = json!({
            "candidates":[{"content":{"parts":[{"text":"  "}]}}],
            "text":"fallback"
        });
        assert_eq!(extract_text(&body), "fallback");
    }

    #[test]
    fn unknown_shape_yields_literal() {
        assert_eq!(extract_text(&json!({"promptFeedback":{"blockReason":"SAFETY"}})), NO_CONTENT);
        assert_eq!(extract_text(&json!([1, 2, 3])), NO_CONTENT);
    }

    #[tokio::test]
    async fn generate_notes_returns_model_text() {
        let t = Canned(Ok(json!({"text":"## Notes"})));
        let req = build_request("", "x", &[], "SYS");
        assert_eq!(generate_notes(&t, &req).await, "## Notes");
    }

    #[tokio::test]
    async fn transport_failure_becomes_error_text() {
        let t = Canned(Err(429));
        let req = build_request("", "x", &[], "SYS");
        let out = generate_notes(&t, &req).await;
        assert_eq!(out, "Error: API Error 429: quota exceeded");
        assert!(is_error_text(&out));
    }

    #[test]
    fn client_requires_api_key() {
        let err = GeminiClient::new(&AppConfig::default()).unwrap_err();
        assert!(matches!(err, NotesError::ApiKeyMissing));
    }

    #[test]
    fn client_endpoint_and_redacted_debug() {
        let config = AppConfig::builder()
            .api_key("secret-key")
            .api_base("https://example.test/v1beta/")
            .model("gemini-test")
            .build()
            .unwrap();
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-test:generateContent"
        );
        assert!(!format!("{client:?}").contains("secret-key"));
    }
}
