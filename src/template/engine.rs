//! Document composition.
//!
//! [`TemplateEngine::compose`] turns a selection key and a variable bag into
//! a finished YAML prompt:
//!
//! ```text
//! selection key ─► section list (SelectionMap)
//!               ─► output type key ─► header values ─┐
//!                                                    ▼
//!   for each section: type body ▸ common body ▸ render(vars + headers)
//!                                                    │
//!                              drop blank fragments ◄┘
//!                              join with blank lines
//!                              prune empty fields (optional)
//! ```
//!
//! Section bodies may pull in other sections with `{{> name key="value"}}`.
//!
//! A section that cannot be found is skipped. Optional sections are skipped
//! quietly; any other missing section is logged and listed in
//! [`Composed::missing`] so callers can tell the document is incomplete.

use super::TemplateError;
use super::document::{MasterTemplate, SelectionMap};
use super::output_type::{OutputType, SelectionOptions};
use super::render::render_with_partials;
use super::tidy::prune_empty_fields;
use super::variables::Variables;
use crate::config::TemplatesConfig;
use log::{debug, warn};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct TemplateEngine {
    master: MasterTemplate,
    selection: SelectionMap,
    optional_sections: Vec<String>,
    prune_empty_fields: bool,
}

/// Result of composing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composed {
    pub selection_key: String,
    pub output_type_key: String,
    pub yaml: String,
    /// Sections that produced output, in document order.
    pub rendered: Vec<String>,
    /// Required sections that were not found in the master template.
    pub missing: Vec<String>,
}

impl Composed {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

impl TemplateEngine {
    pub fn new(master: MasterTemplate, selection: SelectionMap) -> Self {
        let defaults = TemplatesConfig::default();
        Self {
            master,
            selection,
            optional_sections: defaults.optional_sections,
            prune_empty_fields: defaults.prune_empty_fields,
        }
    }

    pub fn load(master_path: &Path, selection_path: &Path) -> Result<Self, TemplateError> {
        Ok(Self::new(
            MasterTemplate::load(master_path)?,
            SelectionMap::load(selection_path)?,
        ))
    }

    /// Load the configured template pair, resolving paths against `config_dir`.
    pub fn from_config(config: &TemplatesConfig, config_dir: &Path) -> Result<Self, TemplateError> {
        let (master_path, selection_path) = config.resolve_paths(config_dir);
        debug!(
            "Loading templates from {} and {}",
            master_path.display(),
            selection_path.display()
        );
        Ok(Self::load(&master_path, &selection_path)?
            .with_optional_sections(config.optional_sections.clone())
            .with_pruning(config.prune_empty_fields))
    }

    pub fn with_optional_sections(mut self, sections: Vec<String>) -> Self {
        self.optional_sections = sections;
        self
    }

    pub fn with_pruning(mut self, prune: bool) -> Self {
        self.prune_empty_fields = prune;
        self
    }

    pub fn master(&self) -> &MasterTemplate {
        &self.master
    }

    pub fn selection(&self) -> &SelectionMap {
        &self.selection
    }

    pub fn is_optional(&self, section: &str) -> bool {
        self.optional_sections.iter().any(|s| s == section)
    }

    /// Section list of a selection key.
    pub fn sections(&self, selection_key: &str) -> Result<&[String], TemplateError> {
        self.selection
            .entry(selection_key)
            .map(|e| e.sections.as_slice())
            .ok_or_else(|| TemplateError::UnknownSelection(selection_key.to_string()))
    }

    /// Output-type block a selection key renders from.
    ///
    /// Entries without `output_type_key` use the selection key itself.
    pub fn output_type_key<'a>(&'a self, selection_key: &'a str) -> Result<&'a str, TemplateError> {
        let entry = self
            .selection
            .entry(selection_key)
            .ok_or_else(|| TemplateError::UnknownSelection(selection_key.to_string()))?;
        Ok(entry.output_type_key.as_deref().unwrap_or(selection_key))
    }

    /// Render one section, type-specific body first, then the common one.
    ///
    /// `{{> name}}` partials resolve against the same lookup.
    pub fn render_section(
        &self,
        output_type_key: &str,
        section: &str,
        vars: &Variables,
    ) -> Option<String> {
        let body = self.master.section_template(output_type_key, section)?;
        Some(render_with_partials(body, vars, |name: &str| {
            self.master.section_template(output_type_key, name)
        }))
    }

    pub fn compose(&self, selection_key: &str, vars: &Variables) -> Result<Composed, TemplateError> {
        let sections = self.sections(selection_key)?;
        let output_type_key = self.output_type_key(selection_key)?;

        let mut all_vars = vars.clone();
        all_vars.fill_missing(self.master.header_values(output_type_key));

        let mut fragments = Vec::with_capacity(sections.len());
        let mut rendered = Vec::new();
        let mut missing = Vec::new();

        for section in sections {
            match self.render_section(output_type_key, section, &all_vars) {
                Some(text) => {
                    if text.trim().is_empty() {
                        debug!("Section '{section}' rendered empty");
                        continue;
                    }
                    fragments.push(text.trim_matches('\n').to_string());
                    rendered.push(section.clone());
                }
                None if self.is_optional(section) => {
                    debug!("Optional section '{section}' not present");
                }
                None => {
                    warn!("Section '{section}' not found for output type '{output_type_key}'");
                    missing.push(section.clone());
                }
            }
        }

        let joined = fragments.join("\n\n");
        let yaml = if self.prune_empty_fields {
            prune_empty_fields(&joined)
        } else {
            joined
        };

        Ok(Composed {
            selection_key: selection_key.to_string(),
            output_type_key: output_type_key.to_string(),
            yaml,
            rendered,
            missing,
        })
    }

    /// Compose by output type, resolving the selection key from `options`.
    pub fn compose_output(
        &self,
        output_type: OutputType,
        options: &SelectionOptions,
        vars: &Variables,
    ) -> Result<Composed, TemplateError> {
        self.compose(&output_type.selection_key(options), vars)
    }
}
