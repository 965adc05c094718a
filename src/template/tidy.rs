//! Post-render cleanup of composed documents.
//!
//! Sections are written for the fullest variable bag, so a sparse bag leaves
//! `key: ""` lines and headers whose children are all empty. Pruning removes
//! both, then collapses runs of blank lines. Indentation here counts a tab
//! as two columns.

/// Remove empty-valued fields and the headers they leave without children.
///
/// Repeats until nothing changes, so a chain of headers that only led to
/// empty fields disappears completely.
pub fn prune_empty_fields(yaml: &str) -> String {
    let mut current: Vec<&str> = yaml.split('\n').collect();
    loop {
        let next = prune_pass(&current);
        if next.len() == current.len() {
            break;
        }
        current = next;
    }
    collapse_blank_lines(&current.join("\n"))
}

fn prune_pass<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    let mut kept = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if is_empty_value_line(line) {
            continue;
        }
        if is_section_header(line, lines.get(i + 1).copied()) && !has_live_child(lines, i) {
            continue;
        }
        kept.push(*line);
    }
    kept
}

/// Whether any deeper-indented line under `lines[header]` carries a value.
fn has_live_child(lines: &[&str], header: usize) -> bool {
    let header_indent = indent_width(lines[header]);
    for child in &lines[header + 1..] {
        let trimmed = child.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if indent_width(child) <= header_indent {
            return false;
        }
        if !is_empty_value_line(child) {
            return true;
        }
    }
    false
}

fn is_empty_value_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.ends_with(": \"\"") || trimmed.ends_with(": ''")
}

/// A bare `key:` line, or any line followed by deeper-indented content.
fn is_section_header(line: &str, next: Option<&str>) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return false;
    }
    if trimmed.ends_with(':') && !trimmed.contains(": ") {
        return true;
    }
    next.is_some_and(|next| {
        let next_trimmed = next.trim();
        !next_trimmed.is_empty()
            && !next_trimmed.starts_with('#')
            && indent_width(next) > indent_width(line)
    })
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .map_while(|c| match c {
            ' ' => Some(1),
            '\t' => Some(2),
            _ => None,
        })
        .sum()
}

/// Collapse consecutive whitespace-only lines into one.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for line in text.split('\n') {
        let blank = line.trim().is_empty();
        if !(blank && previous_blank) {
            out.push(line);
        }
        previous_blank = blank;
    }
    out.join("\n")
}
