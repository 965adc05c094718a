//! Section renderer.
//!
//! Rendering is three passes over the section body:
//!
//! 1. **Conditionals.** `{{#if name}}..{{/if}}` and `{{#unless name}}..{{/unless}}`,
//!    with an optional `{{else}}`. The first block in the text is resolved,
//!    then the search restarts, until none remain. Blocks do not nest: a
//!    block ends at the first matching close tag.
//! 2. **Comments.** `{{! .. }}` spans are removed, including multi-line ones.
//! 3. **Tags.** `{{name}}` and `{{{name}}}` become the variable's text, or
//!    nothing when the name is unset. `{{> name key="value"}}` is replaced by
//!    the partial `name`, rendered with the outer variables plus the given
//!    overrides.
//!
//! Partials come from a lookup supplied by the caller ([`render_with_partials`]);
//! the engine resolves them against the master template's sections. When the
//! tag is alone on its line, continuation lines of the partial get the tag's
//! indentation. An unknown partial becomes a `# Partial not found` comment.
//! Expansion stops [`MAX_PARTIAL_DEPTH`] levels down, so a partial that
//! includes itself still terminates.
//!
//! There is no escaping; values are substituted verbatim.

use super::variables::Variables;
use log::warn;
use regex::{Captures, Regex};
use std::sync::LazyLock;

const ELSE_TAG: &str = "{{else}}";

pub const MAX_PARTIAL_DEPTH: usize = 10;

static CONDITIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\{\{#if\s+([\w.@-]+)\s*\}\}(.*?)\{\{/if\}\}|\{\{#unless\s+([\w.@-]+)\s*\}\}(.*?)\{\{/unless\}\}",
    )
    .expect("conditional pattern is valid")
});

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{!.*?\}\}").expect("comment pattern is valid"));

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{\{>\s*([\w.-]+)([^}]*)\}\}|\{\{\{\s*([\w.@-]+)\s*\}\}\}|\{\{\s*([\w.@-]+)\s*\}\}",
    )
    .expect("tag pattern is valid")
});

static PARTIAL_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)="([^"]*)""#).expect("partial parameter pattern is valid")
});

/// Render one section body against a variable bag. Partial tags resolve to
/// `# Partial not found` comments.
pub fn render(template: &str, vars: &Variables) -> String {
    render_with_partials(template, vars, |_| None)
}

/// Render with `{{> name}}` tags resolved through `partials`.
pub fn render_with_partials<'p, F>(template: &str, vars: &Variables, partials: F) -> String
where
    F: Fn(&str) -> Option<&'p str>,
{
    render_at(template, vars, &partials, 0)
}

fn render_at<'p, F>(template: &str, vars: &Variables, partials: &F, depth: usize) -> String
where
    F: Fn(&str) -> Option<&'p str>,
{
    let resolved = resolve_conditionals(template, vars);
    let uncommented = COMMENT.replace_all(&resolved, "");
    TAG.replace_all(&uncommented, |caps: &Captures| {
        let Some(partial) = caps.get(1) else {
            let name = caps
                .get(3)
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            return vars.text(name);
        };
        let name = partial.as_str();
        let params = caps.get(2).map_or("", |m| m.as_str());
        let body = expand_partial(name, params, vars, partials, depth);
        let start = caps.get(0).map_or(0, |m| m.start());
        indent_continuation(&body, line_indent(&uncommented, start))
    })
    .into_owned()
}

fn expand_partial<'p, F>(
    name: &str,
    params: &str,
    vars: &Variables,
    partials: &F,
    depth: usize,
) -> String
where
    F: Fn(&str) -> Option<&'p str>,
{
    if depth >= MAX_PARTIAL_DEPTH {
        warn!("Partial '{name}' nested deeper than {MAX_PARTIAL_DEPTH} levels");
        return format!("# Partial nesting too deep: {name}");
    }
    let Some(body) = partials(name) else {
        warn!("Partial '{name}' not found");
        return format!("# Partial not found: {name}");
    };
    let mut local = vars.clone();
    for caps in PARTIAL_PARAM.captures_iter(params) {
        local.set(&caps[1], &caps[2]);
    }
    render_at(body, &local, partials, depth + 1)
        .trim_end_matches('\n')
        .to_string()
}

/// Whitespace before `pos` on its line, or `None` when the line has other
/// text before it.
fn line_indent(text: &str, pos: usize) -> Option<&str> {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &text[line_start..pos];
    prefix.chars().all(|c| c == ' ' || c == '\t').then_some(prefix)
}

fn indent_continuation(body: &str, indent: Option<&str>) -> String {
    match indent {
        Some(prefix) if !prefix.is_empty() => body
            .split('\n')
            .enumerate()
            .map(|(i, line)| {
                if i == 0 || line.is_empty() {
                    line.to_string()
                } else {
                    format!("{prefix}{line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => body.to_string(),
    }
}

fn resolve_conditionals(template: &str, vars: &Variables) -> String {
    let mut text = template.to_string();
    // Each pass removes one open and one close tag, so this terminates.
    while let Some(caps) = CONDITIONAL.captures(&text) {
        let (negated, name, body) = match (caps.get(1), caps.get(2)) {
            (Some(name), Some(body)) => (false, name.as_str(), body.as_str()),
            _ => (
                true,
                caps.get(3).map_or("", |m| m.as_str()),
                caps.get(4).map_or("", |m| m.as_str()),
            ),
        };
        let (then_branch, else_branch) = body.split_once(ELSE_TAG).unwrap_or((body, ""));
        let keep_then = vars.is_truthy(name) != negated;
        let replacement = if keep_then { then_branch } else { else_branch }.to_string();

        let Some(range) = caps.get(0).map(|m| m.range()) else {
            break;
        };
        text.replace_range(range, &replacement);
    }
    text
}
