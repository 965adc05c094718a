//! Application configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by a user config file in the config directory (`--config-dir`,
//! default: the current directory).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [templates]
//! master = "templates/MasterTemplate.yaml"
//! selection_map = "templates/SelectionMap.yaml"
//! optional_sections = ["title_overlay", "reference_image", "bonus_character"]
//! prune_empty_fields = false
//!
//! [api]
//! base_url = "https://generativelanguage.googleapis.com/v1beta/models"
//! image_model = "gemini-3-pro-image-preview"
//! translation_model = "gemini-2.5-flash"
//! api_key_env = "GEMINI_API_KEY"
//! image_timeout_secs = 180
//! translation_timeout_secs = 60
//!
//! [generation]
//! mode = "normal"           # normal | redraw | simple
//! resolution = "2K"         # 1K | 2K | 4K
//! aspect_ratio = "1:1"
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early. The API key itself is never read from
//! the file, only from the environment variable named by `api.api_key_env`.

use crate::types::{ApiMode, Resolution, SUPPORTED_ASPECT_RATIOS, is_supported_aspect_ratio};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the config file looked up in the config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Template file locations and composition behaviour.
    pub templates: TemplatesConfig,
    /// Remote API endpoints, models and timeouts.
    pub api: ApiConfig,
    /// Defaults for image generation requests.
    pub generation: GenerationConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "api.base_url must not be empty".into(),
            ));
        }
        if self.api.image_model.trim().is_empty() || self.api.translation_model.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "api.image_model and api.translation_model must not be empty".into(),
            ));
        }
        if self.api.image_timeout_secs == 0 || self.api.translation_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "api timeouts must be greater than zero".into(),
            ));
        }
        if !is_supported_aspect_ratio(&self.generation.aspect_ratio) {
            return Err(ConfigError::Validation(format!(
                "generation.aspect_ratio '{}' is not one of {}",
                self.generation.aspect_ratio,
                SUPPORTED_ASPECT_RATIOS.join(", ")
            )));
        }
        Ok(())
    }
}

/// Where the template files live and how composed documents are finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplatesConfig {
    /// Master template with `common_sections` and `output_types`.
    pub master: PathBuf,
    /// Selection map listing the sections of each selection key.
    pub selection_map: PathBuf,
    /// Sections that may be missing from the master template without a warning.
    pub optional_sections: Vec<String>,
    /// Drop `key: ""` lines and emptied headers from composed documents.
    pub prune_empty_fields: bool,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            master: PathBuf::from("templates/MasterTemplate.yaml"),
            selection_map: PathBuf::from("templates/SelectionMap.yaml"),
            optional_sections: vec![
                "title_overlay".to_string(),
                "reference_image".to_string(),
                "bonus_character".to_string(),
            ],
            prune_empty_fields: false,
        }
    }
}

impl TemplatesConfig {
    /// Template paths are relative to the config directory unless absolute.
    pub fn resolve_paths(&self, config_dir: &Path) -> (PathBuf, PathBuf) {
        (
            config_dir.join(&self.master),
            config_dir.join(&self.selection_map),
        )
    }
}

/// Remote API settings shared by image generation and translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Models endpoint root; `/{model}:generateContent` is appended.
    pub base_url: String,
    /// Model used for image generation.
    pub image_model: String,
    /// Model used for batch translation.
    pub translation_model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout for image generation, in seconds.
    pub image_timeout_secs: u64,
    /// Request timeout for translation, in seconds.
    pub translation_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            image_model: "gemini-3-pro-image-preview".to_string(),
            translation_model: "gemini-2.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            image_timeout_secs: 180,
            translation_timeout_secs: 60,
        }
    }
}

impl ApiConfig {
    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    pub fn translation_timeout(&self) -> Duration {
        Duration::from_secs(self.translation_timeout_secs)
    }

    /// Read the API key from the configured environment variable.
    ///
    /// Returns an empty string when the variable is unset so that key
    /// validation reports "not set" rather than an environment error.
    pub fn api_key(&self) -> String {
        std::env::var(&self.api_key_env).unwrap_or_default()
    }
}

/// Defaults for image generation requests. CLI flags override these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    pub mode: ApiMode,
    pub resolution: Resolution,
    pub aspect_ratio: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            mode: ApiMode::Normal,
            resolution: Resolution::TwoK,
            aspect_ratio: "1:1".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# yamlsmith configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Templates
# ---------------------------------------------------------------------------
[templates]
# Master template: common_sections + output_types, each section holding a
# `template: |` block. Relative paths resolve against the config directory.
master = "templates/MasterTemplate.yaml"

# Selection map: ordered section lists per selection key.
selection_map = "templates/SelectionMap.yaml"

# Sections that may be absent without a warning.
optional_sections = ["title_overlay", "reference_image", "bonus_character"]

# Drop `key: ""` lines (and headers left without children) from output.
prune_empty_fields = false

# ---------------------------------------------------------------------------
# Remote API
# ---------------------------------------------------------------------------
[api]
base_url = "https://generativelanguage.googleapis.com/v1beta/models"
image_model = "gemini-3-pro-image-preview"
translation_model = "gemini-2.5-flash"

# The key is read from this environment variable, never from this file.
api_key_env = "GEMINI_API_KEY"

# Image generation is slow; translation is not.
image_timeout_secs = 180
translation_timeout_secs = 60

# ---------------------------------------------------------------------------
# Image generation defaults (overridable per command)
# ---------------------------------------------------------------------------
[generation]
# normal | redraw | simple
mode = "normal"
# 1K | 2K | 4K
resolution = "2K"
# 1:1 2:3 3:2 3:4 4:3 4:5 5:4 9:16 16:9 21:9
aspect_ratio = "1:1"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_template_paths() {
        let config = AppConfig::default();
        assert_eq!(
            config.templates.master,
            PathBuf::from("templates/MasterTemplate.yaml")
        );
        assert_eq!(
            config.templates.selection_map,
            PathBuf::from("templates/SelectionMap.yaml")
        );
        assert!(!config.templates.prune_empty_fields);
    }

    #[test]
    fn default_config_has_api_timeouts() {
        let config = AppConfig::default();
        assert_eq!(config.api.image_timeout(), Duration::from_secs(180));
        assert_eq!(config.api.translation_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn default_optional_sections() {
        let config = AppConfig::default();
        assert_eq!(
            config.templates.optional_sections,
            vec!["title_overlay", "reference_image", "bonus_character"]
        );
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[generation]
aspect_ratio = "16:9"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.generation.aspect_ratio, "16:9");
        // Defaults preserved
        assert_eq!(config.generation.mode, ApiMode::Normal);
        assert_eq!(config.api.image_model, "gemini-3-pro-image-preview");
    }

    #[test]
    fn unknown_keys_rejected() {
        let toml = r#"
[api]
base_urll = "typo"
"#;
        let result: Result<AppConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn resolve_paths_joins_config_dir() {
        let config = TemplatesConfig::default();
        let (master, selection) = config.resolve_paths(Path::new("/srv/app"));
        assert_eq!(master, PathBuf::from("/srv/app/templates/MasterTemplate.yaml"));
        assert_eq!(selection, PathBuf::from("/srv/app/templates/SelectionMap.yaml"));
    }

    #[test]
    fn resolve_paths_keeps_absolute() {
        let config = TemplatesConfig {
            master: PathBuf::from("/abs/master.yaml"),
            ..TemplatesConfig::default()
        };
        let (master, _) = config.resolve_paths(Path::new("/srv/app"));
        assert_eq!(master, PathBuf::from("/abs/master.yaml"));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.generation.aspect_ratio, "1:1");
        assert_eq!(config.api.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[templates]
prune_empty_fields = true

[generation]
mode = "redraw"
resolution = "4K"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert!(config.templates.prune_empty_fields);
        assert_eq!(config.generation.mode, ApiMode::Redraw);
        assert_eq!(config.generation.resolution, Resolution::FourK);
        // Unspecified values are defaults
        assert_eq!(config.api.translation_timeout_secs, 60);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "not valid toml [[[").unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_rejects_unsupported_aspect_ratio() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[generation]\naspect_ratio = \"7:2\"\n",
        )
        .unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_config_rejects_zero_timeout() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[api]\ntranslation_timeout_secs = 0\n",
        )
        .unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: AppConfig = toml::from_str(stock_config_toml()).unwrap();
        let default = AppConfig::default();
        assert_eq!(config.api.base_url, default.api.base_url);
        assert_eq!(config.templates.optional_sections, default.templates.optional_sections);
        assert_eq!(config.generation.resolution, default.generation.resolution);
        config.validate().unwrap();
    }

    #[test]
    fn api_key_missing_env_is_empty() {
        let config = ApiConfig {
            api_key_env: "YAMLSMITH_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ApiConfig::default()
        };
        assert_eq!(config.api_key(), "");
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("timeout = 60").unwrap();
        let overlay: toml::Value = toml::from_str("timeout = 30").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("timeout").unwrap().as_integer(), Some(30));
    }

    #[test]
    fn merge_toml_nested_tables_preserve_siblings() {
        let base: toml::Value = toml::from_str(
            r#"
[api]
image_model = "a"
translation_model = "b"
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[api]
image_model = "c"
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let api = merged.get("api").unwrap();
        assert_eq!(api.get("image_model").unwrap().as_str(), Some("c"));
        assert_eq!(api.get("translation_model").unwrap().as_str(), Some("b"));
    }

    #[test]
    fn merge_toml_array_replaces_entirely() {
        let base: toml::Value = toml::from_str(r#"sections = ["a", "b"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"sections = ["c"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        let arr = merged.get("sections").unwrap().as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0].as_str(), Some("c"));
    }
}
