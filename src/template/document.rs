//! Master template and selection map documents.
//!
//! Both files are parsed into a YAML tree with `serde_yaml_ng` and projected
//! into the records below; lookups are plain map accesses. Keys the
//! composer has no use for (`description`, `type_value`, `output_values`,
//! `variable_mappings` and the like) are accepted and ignored.
//!
//! ## Master template shape
//!
//! ```yaml
//! version: "1.0"
//! common_sections:
//!   style:
//!     description: Shared style block
//!     template: |
//!       style:
//!         name: "{{style_name}}"
//! output_types:
//!   face_sheet:
//!     header_values:
//!       title: "Character face sheet"
//!     sections:
//!       header:
//!         template: |
//!           title: "{{title}}"
//! ```
//!
//! A section body is the `template:` block scalar. Its first non-blank line
//! fixes the indentation that is stripped; deeper lines keep their relative
//! indentation and interior blank lines survive. Trailing newlines are
//! trimmed. Leading tabs are read as single spaces before parsing so hand
//! edited files with mixed indentation still load.
//!
//! A section whose entry is valid YAML but not a section (an unquoted
//! `template: {{title}}` reads as a flow mapping) is skipped with a warning;
//! compose then reports it as missing. A YAML syntax error anywhere, such as
//! a block body that dedents below its first line, still rejects the whole
//! file since the parser cannot resynchronise after it.

use super::TemplateError;
use log::warn;
use serde::{Deserialize, Deserializer};
use serde_yaml_ng::Value as YamlValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MasterTemplate {
    #[serde(default)]
    version: Option<YamlValue>,
    #[serde(default, deserialize_with = "lenient_sections")]
    pub common_sections: BTreeMap<String, SectionDefinition>,
    #[serde(default)]
    pub output_types: BTreeMap<String, OutputTypeDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionDefinition {
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputTypeDefinition {
    #[serde(default)]
    header_values: BTreeMap<String, YamlValue>,
    #[serde(default, deserialize_with = "lenient_sections")]
    pub sections: BTreeMap<String, SectionDefinition>,
}

impl OutputTypeDefinition {
    /// Header values with scalars stringified. Non-scalar entries are skipped.
    pub fn header_values(&self) -> BTreeMap<String, String> {
        stringify_scalars(&self.header_values)
    }
}

impl MasterTemplate {
    pub fn parse(content: &str) -> Result<Self, TemplateError> {
        let normalized = normalize_indentation(content);
        let mut master: MasterTemplate = serde_yaml_ng::from_str(&normalized)?;
        for section in master.common_sections.values_mut() {
            section.trim_body();
        }
        for output_type in master.output_types.values_mut() {
            for section in output_type.sections.values_mut() {
                section.trim_body();
            }
        }
        Ok(master)
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        Self::parse(&read_document(path)?)
    }

    pub fn version(&self) -> Option<String> {
        self.version.as_ref().and_then(scalar_text)
    }

    pub fn output_type(&self, key: &str) -> Option<&OutputTypeDefinition> {
        self.output_types.get(key)
    }

    /// Body of `name` for `output_type`, falling back to `common_sections`.
    pub fn section_template(&self, output_type: &str, name: &str) -> Option<&str> {
        self.output_types
            .get(output_type)
            .and_then(|t| t.sections.get(name))
            .and_then(|s| s.template.as_deref())
            .or_else(|| self.common_section_template(name))
    }

    pub fn common_section_template(&self, name: &str) -> Option<&str> {
        self.common_sections
            .get(name)
            .and_then(|s| s.template.as_deref())
    }

    /// Header values of an output type, empty for unknown types.
    pub fn header_values(&self, output_type: &str) -> BTreeMap<String, String> {
        self.output_types
            .get(output_type)
            .map(OutputTypeDefinition::header_values)
            .unwrap_or_default()
    }
}

impl SectionDefinition {
    fn trim_body(&mut self) {
        if let Some(body) = self.template.as_mut() {
            let trimmed = body.trim_end_matches(['\n', '\r']).len();
            body.truncate(trimmed);
        }
    }
}

/// Which sections make up each output, in order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectionMap {
    #[serde(default)]
    version: Option<YamlValue>,
    #[serde(default)]
    pub selection_map: BTreeMap<String, SelectionEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectionEntry {
    #[serde(default)]
    pub output_type_key: Option<String>,
    #[serde(default)]
    pub sections: Vec<String>,
}

impl SelectionMap {
    pub fn parse(content: &str) -> Result<Self, TemplateError> {
        let normalized = normalize_indentation(content);
        Ok(serde_yaml_ng::from_str(&normalized)?)
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        Self::parse(&read_document(path)?)
    }

    pub fn version(&self) -> Option<String> {
        self.version.as_ref().and_then(scalar_text)
    }

    pub fn entry(&self, key: &str) -> Option<&SelectionEntry> {
        self.selection_map.get(key)
    }

    /// Ordered section list for `key`; empty when the key is unknown.
    pub fn sections(&self, key: &str) -> &[String] {
        self.selection_map
            .get(key)
            .map(|e| e.sections.as_slice())
            .unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.selection_map.keys().map(String::as_str)
    }
}

/// Section table where entries that do not deserialize are dropped.
fn lenient_sections<'de, D>(deserializer: D) -> Result<BTreeMap<String, SectionDefinition>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, YamlValue>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| {
            match serde_yaml_ng::from_value::<SectionDefinition>(value) {
                Ok(section) => Some((name, section)),
                Err(e) => {
                    warn!("Skipping section '{name}': {e}");
                    None
                }
            }
        })
        .collect())
}

fn read_document(path: &Path) -> Result<String, TemplateError> {
    if !path.exists() {
        return Err(TemplateError::FileNotFound(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}

/// Replace each leading tab with a single space.
///
/// Only the indentation prefix is touched; tabs after the first
/// non-whitespace character are content.
fn normalize_indentation(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for (i, line) in content.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let body_start = line
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(line.len());
        let (prefix, rest) = line.split_at(body_start);
        out.extend(prefix.chars().map(|_| ' '));
        out.push_str(rest);
    }
    out
}

fn scalar_text(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Null => Some(String::new()),
        _ => None,
    }
}

fn stringify_scalars(values: &BTreeMap<String, YamlValue>) -> BTreeMap<String, String> {
    values
        .iter()
        .filter_map(|(key, value)| match scalar_text(value) {
            Some(text) => Some((key.clone(), text)),
            None => {
                warn!("Ignoring non-scalar header value '{key}'");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MASTER: &str = r#"
version: "2.1"
common_sections:
  style:
    description: Shared style
    template: |
      style:
        name: "{{style_name}}"

        notes: "{{style_notes}}"
  footer:
    template: |
      footer: true
output_types:
  face_sheet:
    header_values:
      title: "Face Sheet"
      panels: 4
      nested:
        a: 1
    type_value: character_design
    sections:
      header:
        template: |
          title: "{{title}}"
      style:
        template: |
          style: face_override
"#;

    const SELECTION: &str = r#"
version: "1.0"
selection_map:
  face_sheet:
    output_type_key: face_sheet
    sections:
      - header
      - style
      - footer
  pose_preset:
    output_type_key: pose
    mode: preset
    sections: [header]
variable_mappings:
  pose:
    pose_name: "preset_name"
"#;

    // =========================================================================
    // Master template
    // =========================================================================

    #[test]
    fn type_section_wins_over_common() {
        let master = MasterTemplate::parse(MASTER).unwrap();
        assert_eq!(
            master.section_template("face_sheet", "style"),
            Some("style: face_override")
        );
    }

    #[test]
    fn falls_back_to_common_section() {
        let master = MasterTemplate::parse(MASTER).unwrap();
        assert_eq!(
            master.section_template("face_sheet", "footer"),
            Some("footer: true")
        );
        assert_eq!(
            master.section_template("unknown_type", "footer"),
            Some("footer: true")
        );
    }

    #[test]
    fn missing_section_is_none() {
        let master = MasterTemplate::parse(MASTER).unwrap();
        assert_eq!(master.section_template("face_sheet", "nope"), None);
    }

    #[test]
    fn body_keeps_relative_indentation_and_blank_lines() {
        let master = MasterTemplate::parse(MASTER).unwrap();
        assert_eq!(
            master.common_section_template("style"),
            Some("style:\n  name: \"{{style_name}}\"\n\n  notes: \"{{style_notes}}\"")
        );
    }

    #[test]
    fn tabs_count_as_indentation() {
        let doc = "common_sections:\n\tintro:\n\t\ttemplate: |\n\t\t\tline: 1\n\t\t\t  deeper: 2\n";
        let master = MasterTemplate::parse(doc).unwrap();
        assert_eq!(
            master.common_section_template("intro"),
            Some("line: 1\n  deeper: 2")
        );
    }

    #[test]
    fn header_values_are_stringified() {
        let master = MasterTemplate::parse(MASTER).unwrap();
        let values = master.header_values("face_sheet");
        assert_eq!(values.get("title").map(String::as_str), Some("Face Sheet"));
        assert_eq!(values.get("panels").map(String::as_str), Some("4"));
        assert!(!values.contains_key("nested"));
        assert!(master.header_values("missing").is_empty());
    }

    #[test]
    fn version_and_unused_keys() {
        let master = MasterTemplate::parse(MASTER).unwrap();
        assert_eq!(master.version().as_deref(), Some("2.1"));
        let face_sheet = master.output_type("face_sheet").unwrap();
        assert_eq!(face_sheet.sections.len(), 2);
    }

    #[test]
    fn malformed_section_is_skipped_others_kept() {
        let doc = "common_sections:\n  bad:\n    template: {{title}}\n  good:\n    template: |\n      ok: 1\noutput_types:\n  t:\n    sections:\n      broken:\n        template: [1, 2]\n      fine:\n        template: \"x: {{y}}\"\n";
        let master = MasterTemplate::parse(doc).unwrap();
        assert_eq!(master.common_section_template("bad"), None);
        assert_eq!(master.common_section_template("good"), Some("ok: 1"));
        assert_eq!(master.section_template("t", "broken"), None);
        assert_eq!(master.section_template("t", "fine"), Some("x: {{y}}"));
    }

    #[test]
    fn dedented_block_body_rejects_file() {
        let doc = "common_sections:\n  s:\n    template: |\n        deep: 1\n      shallow: 2\n";
        assert!(matches!(MasterTemplate::parse(doc), Err(TemplateError::Yaml(_))));
    }

    #[test]
    fn invalid_yaml_is_error() {
        let result = MasterTemplate::parse("common_sections: [unclosed");
        assert!(matches!(result, Err(TemplateError::Yaml(_))));
    }

    #[test]
    fn load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let result = MasterTemplate::load(&tmp.path().join("MasterTemplate.yaml"));
        assert!(matches!(result, Err(TemplateError::FileNotFound(_))));
    }

    // =========================================================================
    // Selection map
    // =========================================================================

    #[test]
    fn selection_sections_in_order() {
        let map = SelectionMap::parse(SELECTION).unwrap();
        assert_eq!(map.sections("face_sheet"), ["header", "style", "footer"]);
        assert_eq!(map.sections("pose_preset"), ["header"]);
    }

    #[test]
    fn unknown_selection_is_empty() {
        let map = SelectionMap::parse(SELECTION).unwrap();
        assert!(map.sections("nope").is_empty());
    }

    #[test]
    fn selection_entry_fields() {
        let map = SelectionMap::parse(SELECTION).unwrap();
        let entry = map.entry("pose_preset").unwrap();
        assert_eq!(entry.output_type_key.as_deref(), Some("pose"));
        assert_eq!(map.version().as_deref(), Some("1.0"));
        assert_eq!(map.keys().collect::<Vec<_>>(), ["face_sheet", "pose_preset"]);
    }

    #[test]
    fn normalize_only_touches_prefix() {
        assert_eq!(normalize_indentation("\t\tkey:\tvalue"), "  key:\tvalue");
        assert_eq!(normalize_indentation("a\n\tb"), "a\n b");
    }
}
