//! Shared `generateContent` plumbing.
//!
//! Both image generation and translation post the same request shape to
//! `{base_url}/{model}:generateContent` and get the same envelope back. This
//! module owns the HTTP client, the request structs, key validation and the
//! mapping of non-2xx statuses into a small set of failure categories.

use log::debug;
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Keys shorter than this are rejected before any request is made.
pub const MIN_API_KEY_LEN: usize = 10;

const RESPONSE_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyProblem {
    Missing,
    TooShort,
}

pub fn check_api_key(key: &str) -> Result<(), KeyProblem> {
    if key.is_empty() {
        Err(KeyProblem::Missing)
    } else if key.chars().count() < MIN_API_KEY_LEN {
        Err(KeyProblem::TooShort)
    } else {
        Ok(())
    }
}

// ============================================================================
// Request body
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    /// Single-turn request with the given parts.
    pub fn single(parts: Vec<Part>, generation_config: GenerationConfig) -> Self {
        Self {
            contents: vec![Content { parts }],
            generation_config,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
    pub image_size: String,
}

// ============================================================================
// Transport
// ============================================================================

/// A response as received: status plus the body parsed as JSON.
///
/// Bodies that are not JSON become `Value::Null`.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    pub fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<Reply, reqwest::Error> {
        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()?;

        let status = response.status().as_u16();
        debug!("{model}: status code {status}");
        let text = response.text()?;
        debug!(
            "{model}: raw response (first {RESPONSE_PREVIEW_CHARS} chars): {}",
            preview(&text, RESPONSE_PREVIEW_CHARS)
        );
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Ok(Reply { status, body })
    }
}

/// First `max` characters of `text`, on a char boundary.
pub fn preview(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ============================================================================
// Status mapping
// ============================================================================

/// Why a non-2xx reply failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    BadRequest(String),
    Unauthorized,
    RateLimited(String),
    Server { status: u16, message: String },
    Other { status: u16, message: String },
}

/// `error.message` from an error body, or "Unknown error".
pub fn error_message(body: &Value) -> String {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown error")
        .to_string()
}

/// `None` for 2xx replies.
pub fn classify_status(reply: &Reply) -> Option<HttpFailure> {
    if (200..300).contains(&reply.status) {
        return None;
    }
    let message = error_message(&reply.body);
    debug!("HTTP {}: {message}", reply.status);
    Some(match reply.status {
        400 => HttpFailure::BadRequest(message),
        401 | 403 => HttpFailure::Unauthorized,
        429 => HttpFailure::RateLimited(message),
        status @ 500..=599 => HttpFailure::Server { status, message },
        status => HttpFailure::Other { status, message },
    })
}

/// Text of the first part of the first candidate, if any.
pub fn first_candidate_text(body: &Value) -> Option<&str> {
    body.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_key_checks() {
        assert_eq!(check_api_key(""), Err(KeyProblem::Missing));
        assert_eq!(check_api_key("short"), Err(KeyProblem::TooShort));
        assert_eq!(check_api_key("0123456789"), Ok(()));
    }

    #[test]
    fn endpoint_joins_model() {
        let client = GeminiClient::new(
            "https://example.test/v1beta/models/",
            "key-0123456789",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.endpoint("gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn request_serializes_in_api_shape() {
        let request = GenerateContentRequest::single(
            vec![
                Part::Text {
                    text: "hello".into(),
                },
                Part::Image {
                    inline_data: InlineData {
                        mime_type: "image/png".into(),
                        data: "AAAA".into(),
                    },
                },
            ],
            GenerationConfig {
                response_modalities: Some(vec!["TEXT".into(), "IMAGE".into()]),
                image_config: Some(ImageConfig {
                    aspect_ratio: "16:9".into(),
                    image_size: "2K".into(),
                }),
                ..GenerationConfig::default()
            },
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{"parts": [
                    {"text": "hello"},
                    {"inlineData": {"mimeType": "image/png", "data": "AAAA"}}
                ]}],
                "generationConfig": {
                    "responseModalities": ["TEXT", "IMAGE"],
                    "imageConfig": {"aspectRatio": "16:9", "imageSize": "2K"}
                }
            })
        );
    }

    #[test]
    fn status_mapping() {
        let reply = |status, body| Reply { status, body };
        let err = json!({"error": {"message": "bad thing"}});
        assert_eq!(classify_status(&reply(200, Value::Null)), None);
        assert_eq!(
            classify_status(&reply(400, err.clone())),
            Some(HttpFailure::BadRequest("bad thing".into()))
        );
        assert_eq!(
            classify_status(&reply(403, err.clone())),
            Some(HttpFailure::Unauthorized)
        );
        assert_eq!(
            classify_status(&reply(429, Value::Null)),
            Some(HttpFailure::RateLimited("Unknown error".into()))
        );
        assert_eq!(
            classify_status(&reply(503, err.clone())),
            Some(HttpFailure::Server {
                status: 503,
                message: "bad thing".into()
            })
        );
        assert_eq!(
            classify_status(&reply(418, err)),
            Some(HttpFailure::Other {
                status: 418,
                message: "bad thing".into()
            })
        );
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé");
        assert_eq!(preview("hi", 10), "hi");
    }

    #[test]
    fn first_candidate_text_lookup() {
        let body = json!({"candidates": [{"content": {"parts": [{"text": "yo"}]}}]});
        assert_eq!(first_candidate_text(&body), Some("yo"));
        assert_eq!(first_candidate_text(&json!({})), None);
    }
}
