//! Image file names referenced by a YAML prompt.
//!
//! Generated prompts name their reference images (`reference_sheet:
//! "face.png"`, `image: pose_01.jpg`). These are collected line by line so the
//! caller knows which files to attach. Two forms are recognized:
//!
//! - any quoted string ending in `.png`, `.jpg` or `.jpeg`
//! - an unquoted value at the end of a `key: value` line
//!
//! Extensions match case-insensitively. Results keep first-seen order and
//! contain each name once.
//!
//! Sections are delimited by comment lines: a line starting with `#` opens a
//! section whose name is the rest of the line. [`extract_in_sections`] only
//! looks inside sections whose header starts with one of the given names.

use regex::Regex;
use std::sync::LazyLock;

static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["']([^"']+\.(?:png|jpg|jpeg))["']"#).expect("quoted name pattern is valid")
});

static UNQUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i):\s*([^\s"']+\.(?:png|jpg|jpeg))\s*$"#)
        .expect("unquoted name pattern is valid")
});

fn line_refs(line: &str) -> Vec<String> {
    let mut found: Vec<String> = QUOTED
        .captures_iter(line)
        .map(|c| c[1].to_string())
        .collect();
    if let Some(c) = UNQUOTED.captures(line) {
        let name = c[1].to_string();
        if !found.contains(&name) {
            found.push(name);
        }
    }
    found
}

fn push_unique(out: &mut Vec<String>, names: impl IntoIterator<Item = String>) {
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
}

/// Every referenced image in `yaml`.
pub fn extract(yaml: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in yaml.lines() {
        push_unique(&mut out, line_refs(line));
    }
    out
}

/// Referenced images inside `# <section>` regions only.
pub fn extract_in_section(yaml: &str, section: &str) -> Vec<String> {
    let wanted = section.to_lowercase();
    let mut inside = false;
    let mut out = Vec::new();
    for line in yaml.lines() {
        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix('#') {
            inside = header.trim().to_lowercase().starts_with(&wanted);
            continue;
        }
        if inside {
            push_unique(&mut out, line_refs(line));
        }
    }
    out
}

/// Union of [`extract_in_section`] over `sections`, in section order.
pub fn extract_in_sections<S: AsRef<str>>(yaml: &str, sections: &[S]) -> Vec<String> {
    let mut out = Vec::new();
    for section in sections {
        push_unique(&mut out, extract_in_section(yaml, section.as_ref()));
    }
    out
}
