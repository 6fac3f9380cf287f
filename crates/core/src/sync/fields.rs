#![forbid(unsafe_code)]

use super::canonical::CanonicalPayload;
use crate::model::AcceptanceCriterion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Attributes compared individually when both sides changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    Title,
    Description,
    Status,
    Assignee,
    Priority,
    Labels,
}

impl TrackedField {
    pub const ALL: [TrackedField; 6] = [
        TrackedField::Title,
        TrackedField::Description,
        TrackedField::Status,
        TrackedField::Assignee,
        TrackedField::Priority,
        TrackedField::Labels,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TrackedField::Title => "title",
            TrackedField::Description => "description",
            TrackedField::Status => "status",
            TrackedField::Assignee => "assignee",
            TrackedField::Priority => "priority",
            TrackedField::Labels => "labels",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "title" | "summary" => Some(TrackedField::Title),
            "description" => Some(TrackedField::Description),
            "status" => Some(TrackedField::Status),
            "assignee" => Some(TrackedField::Assignee),
            "priority" => Some(TrackedField::Priority),
            "labels" => Some(TrackedField::Labels),
            _ => None,
        }
    }

    pub fn value_of(self, payload: &CanonicalPayload) -> FieldValue {
        match self {
            TrackedField::Title => FieldValue::Text(payload.title.clone()),
            TrackedField::Description => FieldValue::Document {
                body: payload.description.clone(),
                criteria: payload.acceptance_criteria.clone(),
            },
            TrackedField::Status => FieldValue::Text(payload.status.clone()),
            TrackedField::Assignee => FieldValue::OptionalText(payload.assignee.clone()),
            TrackedField::Priority => FieldValue::OptionalText(payload.priority.clone()),
            TrackedField::Labels => FieldValue::Labels(payload.labels.clone()),
        }
    }

    /// Writes `value` into `payload`; the value kind must match the field.
    pub fn assign(
        self,
        payload: &mut CanonicalPayload,
        value: FieldValue,
    ) -> Result<(), FieldValueMismatch> {
        match (self, value) {
            (TrackedField::Title, FieldValue::Text(v)) => payload.title = v,
            (TrackedField::Status, FieldValue::Text(v)) => payload.status = v,
            (TrackedField::Description, FieldValue::Document { body, criteria }) => {
                payload.description = body;
                payload.acceptance_criteria = criteria;
            }
            (TrackedField::Assignee, FieldValue::OptionalText(v)) => payload.assignee = v,
            (TrackedField::Priority, FieldValue::OptionalText(v)) => payload.priority = v,
            (TrackedField::Labels, FieldValue::Labels(v)) => payload.labels = v,
            (field, _) => return Err(FieldValueMismatch { field }),
        }
        Ok(())
    }

    fn differs(self, a: &CanonicalPayload, b: &CanonicalPayload) -> bool {
        match self {
            TrackedField::Title => a.title != b.title,
            TrackedField::Description => {
                a.description != b.description || a.acceptance_criteria != b.acceptance_criteria
            }
            TrackedField::Status => a.status != b.status,
            TrackedField::Assignee => a.assignee != b.assignee,
            TrackedField::Priority => a.priority != b.priority,
            // BTreeSet equality is set equality.
            TrackedField::Labels => a.labels != b.labels,
        }
    }
}

impl std::fmt::Display for TrackedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    OptionalText(Option<String>),
    Labels(BTreeSet<String>),
    Document {
        body: String,
        criteria: Vec<AcceptanceCriterion>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("value kind does not fit field `{field}`")]
pub struct FieldValueMismatch {
    pub field: TrackedField,
}

/// A field that diverged from its baseline on both sides, to different values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub field: TrackedField,
    pub baseline_local: FieldValue,
    pub baseline_remote: FieldValue,
    pub local: FieldValue,
    pub remote: FieldValue,
}

pub fn changed_fields(
    current: &CanonicalPayload,
    baseline: &CanonicalPayload,
) -> Vec<TrackedField> {
    TrackedField::ALL
        .into_iter()
        .filter(|f| f.differs(current, baseline))
        .collect()
}

/// Enumerates fields changed on both sides since the baseline, in `TrackedField::ALL` order.
///
/// Fields changed on one side only are never reported, nor are fields where both
/// sides moved to the same value.
pub fn detect_field_conflicts(
    local: &CanonicalPayload,
    remote: &CanonicalPayload,
    baseline_local: &CanonicalPayload,
    baseline_remote: &CanonicalPayload,
) -> Vec<FieldConflict> {
    TrackedField::ALL
        .into_iter()
        .filter(|f| f.differs(local, baseline_local) && f.differs(remote, baseline_remote))
        .filter(|f| f.differs(local, remote))
        .map(|field| FieldConflict {
            field,
            baseline_local: field.value_of(baseline_local),
            baseline_remote: field.value_of(baseline_remote),
            local: field.value_of(local),
            remote: field.value_of(remote),
        })
        .collect()
}

/// Three-way merge of the fields changed on one side only.
///
/// Fields that conflict keep the local value; callers overwrite them with a decision.
pub fn merge_one_sided(
    local: &CanonicalPayload,
    remote: &CanonicalPayload,
    baseline_local: &CanonicalPayload,
    baseline_remote: &CanonicalPayload,
) -> CanonicalPayload {
    let mut merged = local.clone();
    for field in TrackedField::ALL {
        let local_changed = field.differs(local, baseline_local);
        let remote_changed = field.differs(remote, baseline_remote);
        if remote_changed && !local_changed {
            // Same kind by construction.
            let _ = field.assign(&mut merged, field.value_of(remote));
        }
    }
    merged
}
