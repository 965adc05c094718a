//! Image generation.
//!
//! A prompt (YAML for `normal` and `redraw`, free text for `simple`) is framed
//! for the chosen [`ApiMode`], packed with any reference images, and sent to
//! the image model. The reply must contain an inline image that actually
//! decodes; anything else becomes a specific [`ApiError`].
//!
//! ## Parts order
//!
//! ```text
//! [0] text       framed prompt
//! [1] inlineData composition image (redraw / simple edit), if any
//! [2..] inlineData character reference images
//! ```

use super::ApiError;
use super::client::{
    GeminiClient, GenerateContentRequest, GenerationConfig, HttpFailure, ImageConfig, InlineData,
    Part, check_api_key, classify_status, preview,
};
use crate::config::ApiConfig;
use crate::types::{ApiMode, Resolution};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, ImageFormat};
use log::debug;
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;

const NO_IMAGE_TEXT_PREVIEW: usize = 200;

/// Everything needed for one generation call.
#[derive(Debug, Clone, Default)]
pub struct ImageRequest {
    pub prompt: String,
    pub mode: ApiMode,
    pub resolution: Resolution,
    pub aspect_ratio: String,
    /// PNG bytes of the composition reference.
    pub composition: Option<Vec<u8>>,
    /// PNG bytes of character references.
    pub characters: Vec<Vec<u8>>,
}

/// A decoded image from the model.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub image: DynamicImage,
    /// Bytes exactly as returned by the API.
    pub raw: Vec<u8>,
    pub mime_type: Option<String>,
}

impl GeneratedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Save in the format implied by the file extension.
    pub fn save(&self, path: &Path) -> Result<(), image::ImageError> {
        self.image.save(path)
    }
}

// ============================================================================
// Prompt framing
// ============================================================================

pub fn build_prompt(
    base_prompt: &str,
    mode: ApiMode,
    resolution: Resolution,
    aspect_ratio: &str,
    has_composition: bool,
) -> String {
    let size = resolution.prompt_description();
    match mode {
        ApiMode::Normal => format!(
            "## OUTPUT RESOLUTION:\nGenerate the image at {size}.\n\n---\n{base_prompt}"
        ),
        ApiMode::Redraw => format!(
            "【HIGH-QUALITY REDRAW MODE】

You are performing a high-quality redraw task.
Use the YAML instructions below AND the attached reference image together.

## OUTPUT RESOLUTION:
Generate the image at {size}.
This is critical - output must be high resolution.

## CRITICAL RULES:
1. Follow the YAML prompt instructions for content and style
2. Use the reference image as a guide for:
   - Exact composition and layout
   - Character positions and poses
   - Speech bubble placements (if any)
   - Scene framing and camera angle
3. Generate a MORE DETAILED, higher quality version
4. Improve: line art clarity, shading details, background details, facial features
5. Maintain the same scene but with professional-level quality

## IMPORTANT - WATERMARK REMOVAL:
If the reference image contains any watermarks, logos, or signatures (such as \"Gemini\" watermark in the corner), DO NOT reproduce them in the output. The output image must be clean without any watermarks.

## IMPORTANT:
- The reference image shows the desired composition - MATCH IT
- The YAML provides detailed instructions - FOLLOW THEM
- Output should look like a polished, professional version of the reference

---
YAML Instructions:
{base_prompt}"
        ),
        ApiMode::Simple if has_composition => format!(
            "# Role
You are an expert image editing AI.

# Task
Generate a NEW image based on the provided input image (Input Image), following the user's instruction (Instruction) to modify specific parts.

# Instruction
{base_prompt}

# Constraints
- Strictly maintain the composition, poses, art style, lighting, and aspect ratio of the input image.
- Only modify the parts specified in the instruction.
- Do NOT change anything that is not explicitly mentioned.
- Output image only, no text explanation.

# Output Specifications
- Resolution: {size}
- Aspect Ratio: {aspect_ratio}

# Important
- If the input image contains any watermarks, logos, or signatures (such as \"Gemini\" watermark), DO NOT reproduce them in the output.
- The output image must be clean without any watermarks."
        ),
        ApiMode::Simple => format!(
            "## IMAGE GENERATION REQUEST

Generate an image based on the following instructions.

## OUTPUT SPECIFICATIONS:
- Resolution: {size}
- Aspect Ratio: {aspect_ratio}

## PROMPT:
{base_prompt}"
        ),
    }
}

fn png_part(png: &[u8]) -> Part {
    Part::Image {
        inline_data: InlineData {
            mime_type: "image/png".to_string(),
            data: BASE64.encode(png),
        },
    }
}

pub fn build_request(request: &ImageRequest) -> GenerateContentRequest {
    let text = build_prompt(
        &request.prompt,
        request.mode,
        request.resolution,
        &request.aspect_ratio,
        request.composition.is_some(),
    );
    let mut parts = vec![Part::Text { text }];
    parts.extend(request.composition.as_deref().map(png_part));
    parts.extend(request.characters.iter().map(|png| png_part(png)));

    GenerateContentRequest::single(
        parts,
        GenerationConfig {
            response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
            image_config: Some(ImageConfig {
                aspect_ratio: request.aspect_ratio.clone(),
                image_size: request.resolution.api_value().to_string(),
            }),
            ..GenerationConfig::default()
        },
    )
}

/// Load any supported image file and re-encode it as PNG.
pub fn load_reference_png(path: &Path) -> Result<Vec<u8>, ApiError> {
    let img = image::open(path)
        .map_err(|e| ApiError::ImageEncoding(format!("{}: {e}", path.display())))?;
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ApiError::ImageEncoding(format!("{}: {e}", path.display())))?;
    Ok(png)
}

// ============================================================================
// Response parsing
// ============================================================================

/// Extract the generated image from a 2xx reply body.
pub fn parse_image_response(body: &Value) -> Result<GeneratedImage, ApiError> {
    if !body.is_object() {
        return Err(ApiError::InvalidResponse);
    }
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        return Err(ApiError::Api(message.to_string()));
    }

    let Some(candidate) = body.pointer("/candidates/0") else {
        let reason = body
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str);
        return Err(match reason {
            Some(reason) => ApiError::SafetyBlock(Some(reason.to_string())),
            None => ApiError::NoImageGenerated(None),
        });
    };

    if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str) {
        let reason = reason.to_ascii_uppercase();
        if reason.contains("SAFETY") {
            return Err(ApiError::SafetyBlock(None));
        }
        if reason.contains("RECITATION") {
            return Err(ApiError::RecitationBlock);
        }
        if reason.contains("MALFORMED_FUNCTION_CALL") {
            let message = candidate
                .get("finishMessage")
                .and_then(Value::as_str)
                .map(str::to_string);
            debug!("MALFORMED_FUNCTION_CALL: {message:?}");
            return Err(ApiError::MalformedFunctionCall(message));
        }
    }

    let Some(parts) = candidate.pointer("/content/parts").and_then(Value::as_array) else {
        return Err(ApiError::NoImageGenerated(None));
    };

    let mut text_reply: Option<&str> = None;
    for part in parts {
        let inline = part.get("inlineData").or_else(|| part.get("inline_data"));
        if let Some(image) = inline.and_then(decode_inline_image) {
            return Ok(image);
        }
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            text_reply = Some(text);
        }
    }

    let preview = text_reply.map(|t| preview(t, NO_IMAGE_TEXT_PREVIEW).to_string());
    Err(ApiError::NoImageGenerated(preview))
}

fn decode_inline_image(inline: &Value) -> Option<GeneratedImage> {
    let data = inline.get("data").and_then(Value::as_str)?;
    let raw = BASE64.decode(data).ok()?;
    let image = image::load_from_memory(&raw).ok()?;
    let mime_type = inline
        .get("mimeType")
        .or_else(|| inline.get("mime_type"))
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(GeneratedImage {
        image,
        raw,
        mime_type,
    })
}

// ============================================================================
// Generator
// ============================================================================

pub struct ImageGenerator {
    client: GeminiClient,
    model: String,
}

impl ImageGenerator {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = GeminiClient::new(&config.base_url, config.api_key(), config.image_timeout())?;
        Ok(Self::new(client, &config.image_model))
    }

    pub fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ApiError> {
        if check_api_key(self.client.api_key()).is_err() {
            return Err(ApiError::InvalidApiKey);
        }

        let body = build_request(request);
        debug!(
            "Sending {} parts to {} ({}, {})",
            body.contents.first().map_or(0, |c| c.parts.len()),
            self.model,
            request.mode,
            request.resolution
        );
        let reply = self.client.generate_content(&self.model, &body)?;

        if let Some(failure) = classify_status(&reply) {
            return Err(match failure {
                HttpFailure::BadRequest(message) => ApiError::BadRequest(message),
                HttpFailure::Unauthorized => ApiError::InvalidApiKey,
                HttpFailure::RateLimited(_) => ApiError::RateLimited,
                HttpFailure::Server { status, message } => ApiError::Server { status, message },
                HttpFailure::Other { status, message } => ApiError::Http { status, message },
            });
        }

        parse_image_response(&reply.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn tiny_png() -> Vec<u8> {
        let img = DynamicImage::new_rgb8(2, 3);
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        png
    }

    fn reply_with_parts(parts: Value) -> Value {
        json!({"candidates": [{"content": {"parts": parts}}]})
    }

    // =========================================================================
    // Prompt framing
    // =========================================================================

    #[test]
    fn normal_prompt_has_resolution_header() {
        let p = build_prompt("scene: x", ApiMode::Normal, Resolution::FourK, "1:1", false);
        assert!(p.starts_with("## OUTPUT RESOLUTION:\nGenerate the image at approximately 4096x4096"));
        assert!(p.ends_with("---\nscene: x"));
    }

    #[test]
    fn redraw_prompt_embeds_yaml() {
        let p = build_prompt("scene: x", ApiMode::Redraw, Resolution::TwoK, "1:1", true);
        assert!(p.starts_with("【HIGH-QUALITY REDRAW MODE】"));
        assert!(p.ends_with("YAML Instructions:\nscene: x"));
    }

    #[test]
    fn simple_prompt_depends_on_reference() {
        let edit = build_prompt("make it sepia", ApiMode::Simple, Resolution::OneK, "3:4", true);
        assert!(edit.starts_with("# Role\nYou are an expert image editing AI."));
        assert!(edit.contains("# Instruction\nmake it sepia"));
        assert!(edit.contains("- Aspect Ratio: 3:4"));

        let fresh = build_prompt("a cat", ApiMode::Simple, Resolution::OneK, "3:4", false);
        assert!(fresh.starts_with("## IMAGE GENERATION REQUEST"));
        assert!(fresh.ends_with("## PROMPT:\na cat"));
    }

    #[test]
    fn request_parts_order_and_config() {
        let png = tiny_png();
        let request = ImageRequest {
            prompt: "p".into(),
            mode: ApiMode::Redraw,
            resolution: Resolution::TwoK,
            aspect_ratio: "16:9".into(),
            composition: Some(png.clone()),
            characters: vec![png.clone(), png],
        };
        let value = serde_json::to_value(build_request(&request)).unwrap();
        let parts = value["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 4);
        assert!(parts[0]["text"].as_str().unwrap().contains("REDRAW"));
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(
            value["generationConfig"],
            json!({
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": {"aspectRatio": "16:9", "imageSize": "2K"}
            })
        );
    }

    #[test]
    fn reference_is_reencoded_as_png() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ref.jpg");
        DynamicImage::new_rgb8(4, 4).save(&path).unwrap();
        let png = load_reference_png(&path).unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn unreadable_reference_is_encoding_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(
            load_reference_png(&path),
            Err(ApiError::ImageEncoding(_))
        ));
    }

    // =========================================================================
    // Response parsing
    // =========================================================================

    #[test]
    fn finds_inline_image_in_either_spelling() {
        let data = BASE64.encode(tiny_png());
        for key in ["inlineData", "inline_data"] {
            let body = reply_with_parts(json!([
                {"text": "here you go"},
                {key: {"mimeType": "image/png", "data": data}}
            ]));
            let image = parse_image_response(&body).unwrap();
            assert_eq!((image.width(), image.height()), (2, 3));
        }
    }

    #[test]
    fn undecodable_image_falls_through_to_no_image() {
        let body = reply_with_parts(json!([
            {"inlineData": {"data": BASE64.encode(b"garbage")}},
            {"text": "sorry"}
        ]));
        match parse_image_response(&body) {
            Err(ApiError::NoImageGenerated(Some(text))) => assert_eq!(text, "sorry"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn text_preview_is_truncated() {
        let long = "x".repeat(500);
        let body = reply_with_parts(json!([{"text": long}]));
        match parse_image_response(&body) {
            Err(ApiError::NoImageGenerated(Some(text))) => assert_eq!(text.len(), 200),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn prompt_feedback_block() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert!(matches!(
            parse_image_response(&body),
            Err(ApiError::SafetyBlock(Some(r))) if r == "SAFETY"
        ));
        assert!(matches!(
            parse_image_response(&json!({"candidates": []})),
            Err(ApiError::NoImageGenerated(None))
        ));
    }

    #[test]
    fn finish_reasons() {
        let with_reason = |reason: &str| json!({"candidates": [{"finishReason": reason}]});
        assert!(matches!(
            parse_image_response(&with_reason("IMAGE_SAFETY")),
            Err(ApiError::SafetyBlock(None))
        ));
        assert!(matches!(
            parse_image_response(&with_reason("recitation")),
            Err(ApiError::RecitationBlock)
        ));
        let body = json!({"candidates": [{
            "finishReason": "MALFORMED_FUNCTION_CALL",
            "finishMessage": "details"
        }]});
        assert!(matches!(
            parse_image_response(&body),
            Err(ApiError::MalformedFunctionCall(Some(m))) if m == "details"
        ));
    }

    #[test]
    fn error_body_and_non_object() {
        let body = json!({"error": {"message": "quota"}});
        assert!(matches!(parse_image_response(&body), Err(ApiError::Api(m)) if m == "quota"));
        assert!(matches!(
            parse_image_response(&Value::Null),
            Err(ApiError::InvalidResponse)
        ));
    }

    #[test]
    fn missing_content_is_no_image() {
        let body = json!({"candidates": [{"finishReason": "STOP"}]});
        assert!(matches!(
            parse_image_response(&body),
            Err(ApiError::NoImageGenerated(None))
        ));
    }

    #[test]
    fn short_key_rejected_before_request() {
        let client =
            GeminiClient::new("http://127.0.0.1:9", "short", std::time::Duration::from_secs(1))
                .unwrap();
        let generator = ImageGenerator::new(client, "model");
        assert!(matches!(
            generator.generate(&ImageRequest::default()),
            Err(ApiError::InvalidApiKey)
        ));
    }
}
