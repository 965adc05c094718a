//! Batch translation of story fields.
//!
//! A batch is a `key → Japanese text` map (see
//! [`translatable_texts`](crate::story::translatable_texts)). The model is
//! asked for a JSON object with the same keys and English values; the reply
//! may come wrapped in a code fence.

use super::TranslationError;
use super::client::{
    GeminiClient, GenerateContentRequest, GenerationConfig, HttpFailure, KeyProblem, Part,
    check_api_key, classify_status, first_candidate_text,
};
use crate::config::ApiConfig;
use crate::story::{Story, translatable_texts};
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;

pub type Batch = BTreeMap<String, String>;

/// The batch for every non-empty translatable field of `story`.
pub fn story_batch(story: &Story) -> Batch {
    translatable_texts(story)
        .into_iter()
        .map(|t| (t.key, t.original))
        .collect()
}

pub fn build_translation_prompt(texts: &Batch) -> String {
    let json = serde_json::to_string(texts).unwrap_or_else(|_| "{}".to_string());
    format!(
        "You are a professional Japanese to English translator for manga/comic production.

## Task
Translate all the Japanese text values in the following JSON to English.
Keep the keys exactly the same, only translate the values.

## Important Guidelines
1. These are descriptions for AI image generation, so translate naturally and descriptively
2. Keep proper nouns (character names, place names) as-is or romanize them
3. Translate emotions, actions, and scenes vividly
4. Output ONLY valid JSON with the same keys and translated values
5. Do not add any explanation or comments

## Input JSON
{json}

## Output
Return a JSON object with the same keys and English translations as values."
    )
}

pub fn build_request(texts: &Batch) -> GenerateContentRequest {
    GenerateContentRequest::single(
        vec![Part::Text {
            text: build_translation_prompt(texts),
        }],
        GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            ..GenerationConfig::default()
        },
    )
}

/// Remove a surrounding ```` ```json ```` / ```` ``` ```` fence, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Extract the translations from a 2xx reply body.
pub fn parse_translation_response(body: &Value) -> Result<Batch, TranslationError> {
    if !body.is_object() {
        return Err(TranslationError::InvalidResponse);
    }
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        return Err(TranslationError::TranslationFailed(message.to_string()));
    }
    let text = first_candidate_text(body).ok_or(TranslationError::InvalidResponse)?;
    debug!("Translation text response: {text}");

    serde_json::from_str::<Batch>(strip_code_fence(text)).map_err(|_| {
        TranslationError::TranslationFailed("could not parse translation result".to_string())
    })
}

pub struct Translator {
    client: GeminiClient,
    model: String,
}

impl Translator {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, TranslationError> {
        let client = GeminiClient::new(
            &config.base_url,
            config.api_key(),
            config.translation_timeout(),
        )?;
        Ok(Self::new(client, &config.translation_model))
    }

    /// Translate every non-blank value; blank values are left out of the request and the result.
    pub fn translate_batch(&self, texts: &Batch) -> Result<Batch, TranslationError> {
        match check_api_key(self.client.api_key()) {
            Err(KeyProblem::Missing) => return Err(TranslationError::ApiKeyNotSet),
            Err(KeyProblem::TooShort) => return Err(TranslationError::InvalidApiKey),
            Ok(()) => {}
        }
        if texts.is_empty() {
            return Err(TranslationError::NoTextsToTranslate);
        }

        let pending: Batch = texts
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if pending.is_empty() {
            return Ok(Batch::new());
        }

        info!("Translating {} texts with {}", pending.len(), self.model);
        let reply = self
            .client
            .generate_content(&self.model, &build_request(&pending))?;

        if let Some(failure) = classify_status(&reply) {
            return Err(match failure {
                HttpFailure::BadRequest(message) => {
                    TranslationError::TranslationFailed(format!("bad request: {message}"))
                }
                HttpFailure::Unauthorized => TranslationError::InvalidApiKey,
                HttpFailure::RateLimited(_) => TranslationError::TranslationFailed(
                    "rate limit reached; wait a while and try again".to_string(),
                ),
                HttpFailure::Server { status, message } | HttpFailure::Other { status, message } => {
                    TranslationError::TranslationFailed(format!("HTTP error {status}: {message}"))
                }
            });
        }

        parse_translation_response(&reply.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{CharacterProfile, PanelCharacter, PanelMode, RenderMode};
    use serde_json::json;
    use std::time::Duration;

    fn translator(key: &str) -> Translator {
        let client = GeminiClient::new("http://127.0.0.1:9", key, Duration::from_secs(1)).unwrap();
        Translator::new(client, "gemini-2.5-flash")
    }

    fn reply(text: &str) -> Value {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
    }

    // =========================================================================
    // Prompt and request
    // =========================================================================

    #[test]
    fn prompt_embeds_sorted_json() {
        let mut batch = Batch::new();
        batch.insert("panel_1_scene".into(), "夜の街".into());
        batch.insert("panel_0_scene".into(), "教室".into());
        let prompt = build_translation_prompt(&batch);
        assert!(prompt.contains(r#"{"panel_0_scene":"教室","panel_1_scene":"夜の街"}"#));
        assert!(prompt.starts_with("You are a professional Japanese to English translator"));
    }

    #[test]
    fn request_asks_for_json() {
        let value = serde_json::to_value(build_request(&Batch::new())).unwrap();
        assert_eq!(
            value["generationConfig"],
            json!({"responseMimeType": "application/json"})
        );
    }

    // =========================================================================
    // Response parsing
    // =========================================================================

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fence("```json\n{\"a\":\"b\"}\n```"), "{\"a\":\"b\"}");
        assert_eq!(strip_code_fence("  ```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fence("{}"), "{}");
    }

    #[test]
    fn parses_fenced_reply() {
        let body = reply("```json\n{\"panel_0_scene\": \"classroom\"}\n```");
        let out = parse_translation_response(&body).unwrap();
        assert_eq!(out["panel_0_scene"], "classroom");
    }

    #[test]
    fn unparseable_reply_fails() {
        let err = parse_translation_response(&reply("not json")).unwrap_err();
        assert!(matches!(
            err,
            TranslationError::TranslationFailed(m) if m == "could not parse translation result"
        ));
    }

    #[test]
    fn missing_text_is_invalid_response() {
        assert!(matches!(
            parse_translation_response(&json!({"candidates": []})),
            Err(TranslationError::InvalidResponse)
        ));
        assert!(matches!(
            parse_translation_response(&json!({"error": {"message": "nope"}})),
            Err(TranslationError::TranslationFailed(m)) if m == "nope"
        ));
    }

    // =========================================================================
    // Pre-flight checks (no network)
    // =========================================================================

    #[test]
    fn key_checks_come_first() {
        assert!(matches!(
            translator("").translate_batch(&Batch::new()),
            Err(TranslationError::ApiKeyNotSet)
        ));
        assert!(matches!(
            translator("abc").translate_batch(&Batch::new()),
            Err(TranslationError::InvalidApiKey)
        ));
    }

    #[test]
    fn empty_batch_is_an_error() {
        assert!(matches!(
            translator("0123456789abc").translate_batch(&Batch::new()),
            Err(TranslationError::NoTextsToTranslate)
        ));
    }

    #[test]
    fn blank_batch_returns_empty_without_request() {
        let mut batch = Batch::new();
        batch.insert("panel_0_scene".into(), "   \n".into());
        let out = translator("0123456789abc").translate_batch(&batch).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn story_batch_uses_translatable_keys() {
        let mut story = Story::new("T", PanelMode::Single);
        story.characters.push(CharacterProfile::named("Aiko"));
        story.panels[0].scene = "教室".into();
        story.panels[0].characters.push(PanelCharacter {
            character: Some(0),
            render_mode: RenderMode::FullBody,
            features: "笑顔".into(),
            ..PanelCharacter::default()
        });
        let batch = story_batch(&story);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch["panel_0_scene"], "教室");
        assert_eq!(batch["panel_0_char_0_features"], "笑顔");
    }
}
