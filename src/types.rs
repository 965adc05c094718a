//! Shared types used across config, API and CLI layers.
//!
//! These are serialized into `config.toml` and parsed from command-line
//! flags, so their string forms must stay stable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a prompt is framed before it is sent to the image model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    /// Structured YAML prompt, resolution header only.
    #[default]
    Normal,
    /// High-quality redraw of an attached composition image.
    Redraw,
    /// Free-text instruction, optionally editing a reference image.
    Simple,
}

impl ApiMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiMode::Normal => "normal",
            ApiMode::Redraw => "redraw",
            ApiMode::Simple => "simple",
        }
    }
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(ApiMode::Normal),
            "redraw" => Ok(ApiMode::Redraw),
            "simple" => Ok(ApiMode::Simple),
            other => Err(format!("unknown mode '{other}' (expected normal, redraw or simple)")),
        }
    }
}

/// Requested output resolution. Serialized as the API's `imageSize` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "1K")]
    OneK,
    #[default]
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    /// Value sent as `generationConfig.imageConfig.imageSize`.
    pub fn api_value(self) -> &'static str {
        match self {
            Resolution::OneK => "1K",
            Resolution::TwoK => "2K",
            Resolution::FourK => "4K",
        }
    }

    /// Human-readable size used inside prompt text.
    pub fn prompt_description(self) -> &'static str {
        match self {
            Resolution::OneK => "approximately 1024x1024 pixels (1K resolution)",
            Resolution::TwoK => "approximately 2048x2048 pixels (2K resolution, high quality)",
            Resolution::FourK => {
                "approximately 4096x4096 pixels (4K resolution, ultra high quality)"
            }
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_value())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "1K" => Ok(Resolution::OneK),
            "2K" => Ok(Resolution::TwoK),
            "4K" => Ok(Resolution::FourK),
            other => Err(format!("unknown resolution '{other}' (expected 1K, 2K or 4K)")),
        }
    }
}

/// Aspect ratios accepted by the image model.
pub const SUPPORTED_ASPECT_RATIOS: &[&str] = &[
    "1:1", "2:3", "3:2", "3:4", "4:3", "4:5", "5:4", "9:16", "16:9", "21:9",
];

pub fn is_supported_aspect_ratio(ratio: &str) -> bool {
    SUPPORTED_ASPECT_RATIOS.contains(&ratio)
}
