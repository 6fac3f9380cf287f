#![forbid(unsafe_code)]

use std::collections::BTreeSet;

/// Normalizes a multi-line body so formatting-only edits hash identically.
///
/// Line endings become `\n`, trailing whitespace is dropped per line, runs of
/// blank lines collapse to a single blank line and the result is trimmed.
pub fn normalize_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    let mut pending_blank = false;
    for line in unified.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if pending_blank {
            out.push_str("\n\n");
            pending_blank = false;
        } else if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out.trim_start().to_string()
}

/// Collapses all inner whitespace runs to one space (single-line fields).
pub fn normalize_line(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn normalize_optional(raw: Option<&str>) -> Option<String> {
    raw.map(normalize_line).filter(|v| !v.is_empty())
}

pub fn normalize_assignee(raw: Option<&str>) -> Option<String> {
    raw.map(|v| v.trim().trim_start_matches('@'))
        .map(normalize_line)
        .filter(|v| !v.is_empty())
}

pub fn normalize_labels(labels: &[String]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for label in labels {
        let trimmed = label.trim();
        if trimmed.is_empty() || trimmed.chars().any(|c| c.is_control()) {
            continue;
        }
        out.insert(trimmed.to_string());
    }
    out
}
