#![forbid(unsafe_code)]

use super::text::{normalize_line, normalize_text};
use crate::model::AcceptanceCriterion;

pub const CRITERIA_HEADING: &str = "## Acceptance Criteria";
pub const CRITERIA_BEGIN: &str = "<!-- AC:BEGIN -->";
pub const CRITERIA_END: &str = "<!-- AC:END -->";

/// A description body with its acceptance-criteria block lifted out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitDescription {
    pub body: String,
    pub criteria: Vec<AcceptanceCriterion>,
}

/// Extracts the acceptance-criteria checklist embedded in a free-text description.
///
/// The marker-delimited form (`<!-- AC:BEGIN -->` .. `<!-- AC:END -->`) is preferred.
/// Without markers, a `## Acceptance Criteria` heading followed by checkbox items is
/// accepted. Items without an explicit `#N` are numbered by position.
pub fn split_description(raw: &str) -> SplitDescription {
    let unified = raw.replace("\r\n", "\n");
    let lines: Vec<&str> = unified.lines().collect();

    let Some((start, end, item_lines)) = locate_block(&lines) else {
        return SplitDescription {
            body: normalize_text(&unified),
            criteria: Vec::new(),
        };
    };

    let mut criteria = Vec::new();
    for line in item_lines {
        let position = criteria.len() as u32 + 1;
        if let Some(item) = parse_item(line, position) {
            criteria.push(item);
        }
    }
    criteria.sort_by_key(|c| c.index);

    let mut remaining: Vec<&str> = Vec::with_capacity(lines.len());
    remaining.extend_from_slice(&lines[..start]);
    if end + 1 < lines.len() {
        remaining.extend_from_slice(&lines[end + 1..]);
    }

    SplitDescription {
        body: normalize_text(&remaining.join("\n")),
        criteria,
    }
}

/// Re-embeds criteria into a body in the canonical block form.
pub fn render_description(body: &str, criteria: &[AcceptanceCriterion]) -> String {
    let body = normalize_text(body);
    if criteria.is_empty() {
        return body;
    }

    let mut block = String::new();
    block.push_str(CRITERIA_HEADING);
    block.push('\n');
    block.push_str(CRITERIA_BEGIN);
    block.push('\n');
    for item in criteria {
        let mark = if item.checked { 'x' } else { ' ' };
        block.push_str(&format!("- [{mark}] #{} {}\n", item.index, item.text));
    }
    block.push_str(CRITERIA_END);

    if body.is_empty() {
        block
    } else {
        format!("{body}\n\n{block}")
    }
}

/// Canonical ordering and text for criteria reported directly by a tracker.
pub fn normalize_criteria(criteria: &[AcceptanceCriterion]) -> Vec<AcceptanceCriterion> {
    let mut out: Vec<AcceptanceCriterion> = criteria
        .iter()
        .map(|c| AcceptanceCriterion {
            index: c.index,
            text: normalize_line(&c.text),
            checked: c.checked,
        })
        .filter(|c| !c.text.is_empty())
        .collect();
    out.sort_by_key(|c| c.index);
    out
}

fn locate_block<'a>(lines: &[&'a str]) -> Option<(usize, usize, Vec<&'a str>)> {
    if let Some(begin) = lines.iter().position(|l| l.trim() == CRITERIA_BEGIN) {
        let start = heading_before(lines, begin).unwrap_or(begin);
        let close = lines[begin + 1..]
            .iter()
            .position(|l| l.trim() == CRITERIA_END)
            .map(|offset| begin + 1 + offset);
        return Some(match close {
            Some(end) => (start, end, lines[begin + 1..end].to_vec()),
            None => {
                let last = trailing_items_end(lines, begin);
                (start, last, lines[begin + 1..=last].to_vec())
            }
        });
    }

    let heading = lines.iter().position(|l| is_heading(l))?;
    let last = trailing_items_end(lines, heading);
    Some((heading, last, lines[heading + 1..=last].to_vec()))
}

// Index of the last checkbox line in the run following `from` (blank lines allowed).
fn trailing_items_end(lines: &[&str], from: usize) -> usize {
    let mut last = from;
    for (offset, line) in lines[from + 1..].iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parse_item(trimmed, 0).is_none() {
            break;
        }
        last = from + 1 + offset;
    }
    last
}

fn heading_before(lines: &[&str], index: usize) -> Option<usize> {
    let candidate = lines[..index]
        .iter()
        .rposition(|l| !l.trim().is_empty())?;
    is_heading(lines[candidate]).then_some(candidate)
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('#')
        && trimmed
            .trim_start_matches('#')
            .trim()
            .eq_ignore_ascii_case("acceptance criteria")
}

fn parse_item(line: &str, position: u32) -> Option<AcceptanceCriterion> {
    let trimmed = line.trim();
    let rest = trimmed
        .strip_prefix("- [")
        .or_else(|| trimmed.strip_prefix("* ["))?;
    let mut chars = rest.chars();
    let checked = match chars.next()? {
        ' ' => false,
        'x' | 'X' => true,
        _ => return None,
    };
    let rest = chars.as_str().strip_prefix(']')?;
    let text = rest.trim();

    let (index, text) = match text.strip_prefix('#') {
        Some(numbered) => {
            let digits: String = numbered.chars().take_while(|c| c.is_ascii_digit()).collect();
            let tail = &numbered[digits.len()..];
            match digits.parse::<u32>() {
                Ok(index) if tail.is_empty() || tail.starts_with(char::is_whitespace) => {
                    (index, tail)
                }
                _ => (position, text),
            }
        }
        None => (position, text),
    };

    let text = normalize_line(text);
    if text.is_empty() {
        return None;
    }
    Some(AcceptanceCriterion {
        index,
        text,
        checked,
    })
}
