#![forbid(unsafe_code)]

use super::criteria::{normalize_criteria, render_description, split_description};
use super::status_map::StatusMap;
use super::text::{normalize_assignee, normalize_labels, normalize_line, normalize_optional};
use crate::model::{AcceptanceCriterion, LocalTask, RemoteIssue, Side};
use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Side-agnostic representation of a task/issue used for comparison and baselines.
///
/// Only fields subject to sync are kept; ids, issue types and other tracker
/// metadata are stripped by [`Normalizer`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPayload {
    pub title: String,
    pub description: String,
    pub status: String,
    pub assignee: Option<String>,
    pub priority: Option<String>,
    pub labels: BTreeSet<String>,
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
}

impl CanonicalPayload {
    pub fn hash(&self) -> ContentHash {
        hash_payload(self)
    }

    /// Description as written to a tracker that has no structured criteria field.
    pub fn rendered_description(&self) -> String {
        render_description(&self.description, &self.acceptance_criteria)
    }
}

/// Lowercase hex SHA-256 of a canonical payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accepts a previously persisted digest; rejects anything but 64 lowercase hex chars.
    pub fn from_hex(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let valid = value.len() == 64
            && value
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then_some(Self(value))
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content hash over a length-prefixed encoding of every field, so two payloads
/// share a hash exactly when they are field-wise equal.
pub fn hash_payload(payload: &CanonicalPayload) -> ContentHash {
    let mut hasher = sha2::Sha256::new();
    feed_str(&mut hasher, b't', &payload.title);
    feed_str(&mut hasher, b'd', &payload.description);
    feed_str(&mut hasher, b's', &payload.status);
    feed_opt(&mut hasher, b'a', payload.assignee.as_deref());
    feed_opt(&mut hasher, b'p', payload.priority.as_deref());

    hasher.update([b'l']);
    hasher.update((payload.labels.len() as u64).to_le_bytes());
    for label in &payload.labels {
        feed_str(&mut hasher, b'-', label);
    }

    hasher.update([b'c']);
    hasher.update((payload.acceptance_criteria.len() as u64).to_le_bytes());
    for item in &payload.acceptance_criteria {
        hasher.update(item.index.to_le_bytes());
        hasher.update([u8::from(item.checked)]);
        feed_str(&mut hasher, b'-', &item.text);
    }

    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        let _ = write!(&mut out, "{b:02x}");
    }
    ContentHash(out)
}

fn feed_str(hasher: &mut sha2::Sha256, tag: u8, value: &str) {
    hasher.update([tag]);
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn feed_opt(hasher: &mut sha2::Sha256, tag: u8, value: Option<&str>) {
    match value {
        Some(value) => {
            hasher.update([1u8]);
            feed_str(hasher, tag, value);
        }
        None => hasher.update([0u8, tag]),
    }
}

/// A raw record from either tracker.
#[derive(Clone, Copy, Debug)]
pub enum RawRecord<'a> {
    Local(&'a LocalTask),
    Remote(&'a RemoteIssue),
}

impl RawRecord<'_> {
    pub fn side(&self) -> Side {
        match self {
            RawRecord::Local(_) => Side::Local,
            RawRecord::Remote(_) => Side::Remote,
        }
    }
}

/// Converts tracker records into canonical payloads. Pure; safe to share across threads.
#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    statuses: StatusMap,
}

impl Normalizer {
    pub fn new(statuses: StatusMap) -> Self {
        Self { statuses }
    }

    pub fn statuses(&self) -> &StatusMap {
        &self.statuses
    }

    pub fn normalize(&self, record: RawRecord<'_>) -> CanonicalPayload {
        match record {
            RawRecord::Local(task) => self.local(task),
            RawRecord::Remote(issue) => self.remote(issue),
        }
    }

    pub fn local(&self, task: &LocalTask) -> CanonicalPayload {
        let split = split_description(&task.description);
        // Structured criteria from the tracker win over a block left in the body.
        let acceptance_criteria = if task.acceptance_criteria.is_empty() {
            split.criteria
        } else {
            normalize_criteria(&task.acceptance_criteria)
        };
        CanonicalPayload {
            title: normalize_line(&task.title),
            description: split.body,
            status: self.statuses.canonical_from_local(&task.status),
            assignee: normalize_assignee(task.assignee.as_deref()),
            priority: normalize_optional(task.priority.as_deref()),
            labels: normalize_labels(&task.labels),
            acceptance_criteria,
        }
    }

    pub fn remote(&self, issue: &RemoteIssue) -> CanonicalPayload {
        let split = split_description(issue.description.as_deref().unwrap_or_default());
        CanonicalPayload {
            title: normalize_line(&issue.summary),
            description: split.body,
            status: self.statuses.canonical_from_remote(&issue.status),
            assignee: normalize_assignee(issue.assignee.as_deref()),
            priority: normalize_optional(issue.priority.as_deref()),
            labels: normalize_labels(&issue.labels),
            acceptance_criteria: split.criteria,
        }
    }
}
