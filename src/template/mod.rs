//! Template-driven YAML prompt composition.
//!
//! A prompt document is assembled from named sections of a master template.
//! The selection map decides which sections a given output needs and in what
//! order; the renderer fills each section's body from a variable bag.
//!
//! ```text
//! SelectionMap.yaml ──► section list ──┐
//!                                      ├──► render each ──► join ──► tidy
//! MasterTemplate.yaml ─► section body ─┘        ▲
//!                                               │
//!                                      Variables (text / flags)
//! ```
//!
//! | Module | Role |
//! |--------|------|
//! | [`variables`] | The variable bag: names mapped to text or boolean flags |
//! | [`document`] | Master template and selection map, parsed as YAML trees |
//! | [`render`] | Mustache-like renderer: conditionals, comments, substitution, partials |
//! | [`tidy`] | Post-render cleanup of empty fields and blank-line runs |
//! | [`output_type`] | Output-type catalogue and selection-key resolution |
//! | [`engine`] | Ties the above together into a composed document |

pub mod document;
pub mod engine;
pub mod output_type;
pub mod render;
pub mod tidy;
pub mod variables;

pub use document::{MasterTemplate, SelectionMap};
pub use engine::{Composed, TemplateEngine};
pub use output_type::{OutputType, SceneType, SelectionOptions};
pub use render::{render, render_with_partials};
pub use variables::{Value, Variables};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Template file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error("Variables file error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Unknown selection key: {0}")]
    UnknownSelection(String),
    #[error("Unknown output type: {0}")]
    UnknownOutputType(String),
    #[error("Invalid variable: {0}")]
    InvalidVariable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use std::fs;

    #[test]
    fn fixture_templates_load() {
        let tmp = setup_fixtures();
        let engine = fixture_engine(tmp.path());
        assert_eq!(engine.master().version().as_deref(), Some("2.1"));
        assert!(engine.selection().keys().any(|k| k == "scene_builder_story"));
    }

    #[test]
    fn edited_master_template_is_picked_up() {
        let tmp = setup_fixtures();
        let path = tmp.path().join("templates/MasterTemplate.yaml");
        let content = read_fixture(tmp.path(), "templates/MasterTemplate.yaml")
            .replace("title: \"Face Sheet\"", "title: \"Portrait\"");
        fs::write(&path, content).unwrap();

        let composed = fixture_engine(tmp.path())
            .compose("face_sheet", &Variables::new())
            .unwrap();
        assert!(composed.yaml.contains("# Portrait"));
    }

    #[test]
    fn missing_master_template_is_reported_with_path() {
        let tmp = setup_fixtures();
        fs::remove_file(tmp.path().join("templates/MasterTemplate.yaml")).unwrap();
        let config = crate::config::load_config(tmp.path()).unwrap();
        let result = TemplateEngine::from_config(&config.templates, tmp.path());
        assert!(matches!(result, Err(TemplateError::FileNotFound(p)) if p.ends_with("MasterTemplate.yaml")));
    }

    #[test]
    fn variables_file_drives_render() {
        let tmp = setup_fixtures();
        let vars_path = tmp.path().join("vars.toml");
        fs::write(&vars_path, "character_name = \"Ren\"\nallow_text = true\n").unwrap();
        let vars = Variables::load(&vars_path).unwrap();

        let composed = fixture_engine(tmp.path()).compose("face_sheet", &vars).unwrap();
        assert!(composed.yaml.contains("name: \"Ren\""));
        assert!(!composed.yaml.contains("no text in image"));
    }
}
