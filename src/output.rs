//! CLI output formatting.
//!
//! Every command has a `format_*` function returning `Vec<String>` and a
//! `print_*` wrapper that writes the lines to stdout. Format functions are
//! pure, so the display contract is tested without capturing stdout.
//!
//! Entities lead with a 3-digit positional index; details follow on lines
//! indented by four spaces per level.
//!
//! # Output Format
//!
//! ## Sections
//!
//! ```text
//! face_sheet → face_sheet
//! 001 header
//! 002 character_info
//! 003 title_overlay (optional)
//! ```
//!
//! ## Story import
//!
//! ```text
//! Story: 放課後の約束 (4 panels)
//! Characters
//! 001 Aiko [actor_A] matched
//!     Face reference: aiko_face.png
//! 002 Ren [actor_B] NOT IN ROSTER
//! Warnings
//!     panel 2, character 1 is not a mapping, skipped
//! ```

use crate::api::GeneratedImage;
use crate::story::decode::ImportedStory;
use crate::story::{MatchReport, Story, ValidationIssue};
use crate::template::Composed;
use std::path::Path;

const SCENE_PREVIEW_CHARS: usize = 40;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Templates
// ============================================================================

pub fn format_sections(
    selection_key: &str,
    output_type_key: &str,
    sections: &[String],
    is_optional: impl Fn(&str) -> bool,
) -> Vec<String> {
    let mut lines = vec![format!("{selection_key} → {output_type_key}")];
    for (i, section) in sections.iter().enumerate() {
        let marker = if is_optional(section.as_str()) { " (optional)" } else { "" };
        lines.push(format!("{} {section}{marker}", format_index(i + 1)));
    }
    lines
}

pub fn print_sections(
    selection_key: &str,
    output_type_key: &str,
    sections: &[String],
    is_optional: impl Fn(&str) -> bool,
) {
    for line in format_sections(selection_key, output_type_key, sections, is_optional) {
        println!("{line}");
    }
}

/// Summary shown after a document is written to a file.
pub fn format_composed(composed: &Composed, destination: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "{} → {} ({})",
        composed.selection_key,
        destination.display(),
        plural(composed.rendered.len(), "section")
    )];
    if !composed.missing.is_empty() {
        lines.push(format!("{}Missing sections:", indent(1)));
        for name in &composed.missing {
            lines.push(format!("{}{name}", indent(2)));
        }
    }
    lines
}

pub fn print_composed(composed: &Composed, destination: &Path) {
    for line in format_composed(composed, destination) {
        println!("{line}");
    }
}

// ============================================================================
// Stories
// ============================================================================

pub fn format_story_summary(story: &Story) -> Vec<String> {
    let mut lines = vec![format!(
        "Story: {} ({})",
        story.title,
        plural(story.panels.len(), "panel")
    )];
    lines.push("Characters".to_string());
    for (i, character) in story.characters.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), character.name));
    }
    lines.push("Panels".to_string());
    for panel in &story.panels {
        lines.push(format!(
            "{} {}",
            format_index(panel.number as usize),
            truncate(&panel.scene, SCENE_PREVIEW_CHARS)
        ));
        for slot in &panel.characters {
            let name = story
                .character_for(slot)
                .map_or("(unassigned)", |c| c.name.as_str());
            lines.push(format!("{}{name}: {}", indent(1), slot.render_mode));
        }
    }
    lines
}

pub fn print_story_summary(story: &Story) {
    for line in format_story_summary(story) {
        println!("{line}");
    }
}

pub fn format_validation_issues(issues: &[ValidationIssue]) -> Vec<String> {
    let mut lines = vec![format!(
        "Story cannot be exported ({})",
        plural(issues.len(), "problem")
    )];
    lines.extend(issues.iter().map(|issue| format!("{}{issue}", indent(1))));
    lines
}

pub fn format_import_report(imported: &ImportedStory, report: Option<&MatchReport>) -> Vec<String> {
    let mut lines = vec![format!(
        "Story: {} ({})",
        imported.title.as_deref().unwrap_or("(untitled)"),
        plural(imported.panels.len(), "panel")
    )];

    lines.push("Characters".to_string());
    match report {
        Some(report) => {
            for (i, m) in report.matches.iter().enumerate() {
                let key = m
                    .actor_key
                    .as_deref()
                    .map(|k| format!(" [{k}]"))
                    .unwrap_or_default();
                let status = if m.is_matched() { "matched" } else { "NOT IN ROSTER" };
                lines.push(format!("{} {}{key} {status}", format_index(i + 1), m.yaml_name));
                if let Some(face) = &m.face_reference {
                    lines.push(format!("{}Face reference: {face}", indent(1)));
                }
                if let Some(chibi) = &m.chibi_reference {
                    lines.push(format!("{}Chibi reference: {chibi}", indent(1)));
                }
            }
        }
        None => {
            for (i, name) in imported.character_names().iter().enumerate() {
                lines.push(format!("{} {name}", format_index(i + 1)));
            }
        }
    }

    if !imported.warnings.is_empty() {
        lines.push("Warnings".to_string());
        for warning in &imported.warnings {
            lines.push(format!("{}{warning}", indent(1)));
        }
    }
    lines
}

pub fn print_import_report(imported: &ImportedStory, report: Option<&MatchReport>) {
    for line in format_import_report(imported, report) {
        println!("{line}");
    }
}

// ============================================================================
// Images
// ============================================================================

pub fn format_image_refs(names: &[String]) -> Vec<String> {
    if names.is_empty() {
        return vec!["No image references found".to_string()];
    }
    names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{} {name}", format_index(i + 1)))
        .collect()
}

pub fn print_image_refs(names: &[String]) {
    for line in format_image_refs(names) {
        println!("{line}");
    }
}

pub fn format_generated(image: &GeneratedImage, destination: &Path) -> Vec<String> {
    vec![format!(
        "Generated {}x{} → {}",
        image.width(),
        image.height(),
        destination.display()
    )]
}

pub fn print_generated(image: &GeneratedImage, destination: &Path) {
    for line in format_generated(image, destination) {
        println!("{line}");
    }
}
