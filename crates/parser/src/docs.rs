//! Doc-comment parsing shared by both extractors.
//!
//! JSDoc blocks (`/** ... */`) yield a description plus tags; Python docstrings yield
//! only a description.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static TAG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@([A-Za-z_][\w.\-]*)\s*(.*)$").expect("valid tag regex"));

/// Parsed doc-comment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocComment {
    /// Text before the first tag; `None` when nothing was collected
    pub description: Option<String>,

    /// Tag name → tag text, a repeated tag keeps its last value
    pub tags: BTreeMap<String, String>,
}

impl DocComment {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.tags.is_empty()
    }
}

/// Parse a raw `/** ... */` block.
///
/// Delimiters and per-line `*` markers are stripped. A line starting with `@name` opens
/// a tag; the rest of that line and every following non-tag line belong to it.
#[must_use]
pub fn parse_jsdoc(raw: &str) -> DocComment {
    let body = strip_block_delimiters(raw);

    let mut description: Vec<&str> = Vec::new();
    let mut tags = BTreeMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in body.lines() {
        let line = strip_line_marker(line);

        if let Some(caps) = TAG_LINE.captures(line) {
            if let Some((name, parts)) = current.take() {
                tags.insert(name, parts.join(" "));
            }
            let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
            let rest = caps.get(2).map_or("", |m| m.as_str().trim());
            let parts = if rest.is_empty() { Vec::new() } else { vec![rest] };
            current = Some((name, parts));
            continue;
        }

        if line.is_empty() {
            continue;
        }

        match current.as_mut() {
            Some((_, parts)) => parts.push(line),
            None => description.push(line),
        }
    }

    if let Some((name, parts)) = current {
        tags.insert(name, parts.join(" "));
    }

    let description = description.join(" ").trim().to_string();
    DocComment {
        description: (!description.is_empty()).then_some(description),
        tags,
    }
}

/// Build a doc-comment from decoded Python docstring content.
///
/// Python docstrings carry no tag syntax here: the cleaned text is the description.
#[must_use]
pub fn parse_docstring(content: &str) -> DocComment {
    DocComment {
        description: clean_docstring(content),
        tags: BTreeMap::new(),
    }
}

/// Normalize docstring indentation the way Python's own docstring accessor does:
/// tabs expanded, first line stripped, common indentation of the remaining lines removed,
/// leading and trailing blank lines dropped.
#[must_use]
pub fn clean_docstring(content: &str) -> Option<String> {
    let expanded: Vec<String> = content.split('\n').map(expand_tabs).collect();

    let margin = expanded
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);

    let mut lines: Vec<String> = Vec::with_capacity(expanded.len());
    for (idx, line) in expanded.iter().enumerate() {
        if idx == 0 {
            lines.push(line.trim_start().to_string());
        } else if line.trim().is_empty() {
            lines.push(String::new());
        } else {
            lines.push(line.chars().skip(margin).collect());
        }
    }

    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let cleaned = lines.join("\n");
    (!cleaned.is_empty()).then_some(cleaned)
}

fn strip_block_delimiters(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("/**")
        .or_else(|| trimmed.strip_prefix("/*"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("*/").unwrap_or(trimmed)
}

fn strip_line_marker(line: &str) -> &str {
    let line = line.trim();
    match line.strip_prefix('*') {
        Some(rest) => rest.trim(),
        None => line,
    }
}

fn expand_tabs(line: &str) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + 8);
    let mut col = 0usize;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = 8 - (col % 8);
            out.extend(std::iter::repeat(' ').take(pad));
            col += pad;
        } else {
            out.push(ch);
            col += 1;
        }
    }
    out
}
