//! Manga stories and their YAML form.
//!
//! | Module | Role |
//! |--------|------|
//! | [`model`] | The editable story and its validation rules |
//! | [`encode`] | Story → YAML, with optional translated fields |
//! | [`decode`] | YAML → imported story, tolerant and with warnings |
//! | [`roster`] | Matching an imported cast against saved characters |
//!
//! Encoding then decoding is lossless for the fields the YAML carries:
//!
//! ```text
//! Story ──encode──► story.yaml ──decode──► ImportedStory ──to_story──► Story
//! ```

pub mod decode;
pub mod encode;
pub mod model;
pub mod roster;

pub use decode::{ImportedStory, decode};
pub use encode::{TranslatableText, encode, encode_with_translations, translatable_texts};
pub use model::{
    CharacterProfile, Guest, Panel, PanelCharacter, PanelMode, RenderMode, Story, ValidationIssue,
};
pub use roster::{MatchReport, match_characters};

use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Story file must be a YAML mapping at the top level")]
    NotAMapping,
    #[error("Story is incomplete:\n{}", format_issues(.0))]
    Invalid(Vec<ValidationIssue>),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("  - {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Story {
    /// Validate, returning every issue at once.
    pub fn check(&self) -> Result<(), StoryError> {
        let issues = self.validate();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(StoryError::Invalid(issues))
        }
    }
}

/// Read a JSON story draft.
pub fn load_draft(path: &Path) -> Result<Story, StoryError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write a story as a pretty-printed JSON draft.
pub fn save_draft(story: &Story, path: &Path) -> Result<(), StoryError> {
    let json = serde_json::to_string_pretty(story)?;
    fs::write(path, json)?;
    Ok(())
}
