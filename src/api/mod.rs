//! Remote model calls: image generation and batch translation.
//!
//! | Module | Role |
//! |--------|------|
//! | [`client`] | HTTP client, request structs, key check, status classification |
//! | [`image`] | Prompt framing per mode, reference packing, image extraction |
//! | [`translate`] | Japanese → English batch translation of story fields |
//!
//! Each call is a single request/response round trip with the configured
//! timeout. Nothing is retried.

pub mod client;
pub mod image;
pub mod translate;

pub use client::{GeminiClient, MIN_API_KEY_LEN};
pub use image::{GeneratedImage, ImageGenerator, ImageRequest};
pub use translate::Translator;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API key is missing or invalid (at least {MIN_API_KEY_LEN} characters required)")]
    InvalidApiKey,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid response from API")]
    InvalidResponse,
    #[error("Blocked by safety filter{}", suffix(.0))]
    SafetyBlock(Option<String>),
    #[error("Blocked for reproducing copyrighted content")]
    RecitationBlock,
    #[error("Model returned a malformed function call{}", suffix(.0))]
    MalformedFunctionCall(Option<String>),
    #[error("Rate limit reached; wait a while and try again")]
    RateLimited,
    #[error("No image was generated{}", suffix(.0))]
    NoImageGenerated(Option<String>),
    #[error("Could not encode reference image: {0}")]
    ImageEncoding(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("API error: {0}")]
    Api(String),
}

#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("API key is not set")]
    ApiKeyNotSet,
    #[error("API key is invalid")]
    InvalidApiKey,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid response from API")]
    InvalidResponse,
    #[error("Translation failed: {0}")]
    TranslationFailed(String),
    #[error("Nothing to translate")]
    NoTextsToTranslate,
}

fn suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {d}"),
        None => String::new(),
    }
}
