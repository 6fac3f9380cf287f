#![forbid(unsafe_code)]

use crate::decision::{DecisionChoice, DecisionSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tb_core::ids::TaskId;
use tb_core::sync::{CanonicalPayload, FieldConflict, TrackedField, merge_one_sided};
use tracing::{debug, warn};

/// How a detected conflict is settled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    PreferLocal,
    PreferRemote,
    #[default]
    Prompt,
    Manual,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::PreferLocal => "prefer-local",
            Strategy::PreferRemote => "prefer-remote",
            Strategy::Prompt => "prompt",
            Strategy::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prefer-local" | "local" => Some(Strategy::PreferLocal),
            "prefer-remote" | "remote" => Some(Strategy::PreferRemote),
            "prompt" => Some(Strategy::Prompt),
            "manual" => Some(Strategy::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Strategy::parse(value).ok_or_else(|| format!("unknown conflict strategy {value:?}"))
    }
}

/// Both current payloads of a conflicting entity and its baseline pair.
#[derive(Clone, Copy, Debug)]
pub struct ConflictContext<'a> {
    pub entity: &'a TaskId,
    pub local: &'a CanonicalPayload,
    pub remote: &'a CanonicalPayload,
    pub baseline_local: &'a CanonicalPayload,
    pub baseline_remote: &'a CanonicalPayload,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Bring both sides to this payload, writing only the sides that differ from it.
    Apply(CanonicalPayload),
    /// Leave both sides and the baseline alone and flag the entity.
    Manual { reason: String },
}

/// Settles a `Conflict`-classified entity according to `strategy`.
///
/// `prompt` consults `decisions` only when at least one field conflicts; any
/// failure of the decision source degrades to `Manual` for this entity.
pub fn resolve_conflict(
    strategy: Strategy,
    ctx: ConflictContext<'_>,
    conflicts: &[FieldConflict],
    decisions: &dyn DecisionSource,
) -> Resolution {
    match strategy {
        Strategy::PreferLocal => Resolution::Apply(ctx.local.clone()),
        Strategy::PreferRemote => Resolution::Apply(ctx.remote.clone()),
        Strategy::Manual => Resolution::Manual {
            reason: "manual strategy".to_string(),
        },
        Strategy::Prompt => prompt(ctx, conflicts, decisions),
    }
}

fn prompt(
    ctx: ConflictContext<'_>,
    conflicts: &[FieldConflict],
    decisions: &dyn DecisionSource,
) -> Resolution {
    let mut merged =
        merge_one_sided(ctx.local, ctx.remote, ctx.baseline_local, ctx.baseline_remote);
    if conflicts.is_empty() {
        debug!(local_id = %ctx.entity, "both sides converged; merging without a prompt");
        return Resolution::Apply(merged);
    }

    let answers = match decisions.resolve(ctx.entity, conflicts) {
        Ok(answers) => answers,
        Err(err) => {
            warn!(
                local_id = %ctx.entity,
                error = %err,
                "decision source unavailable; leaving for manual resolution"
            );
            return Resolution::Manual {
                reason: err.to_string(),
            };
        }
    };
    let mut by_field: BTreeMap<TrackedField, DecisionChoice> = answers
        .into_iter()
        .map(|decision| (decision.field, decision.choice))
        .collect();

    for conflict in conflicts {
        let Some(choice) = by_field.remove(&conflict.field) else {
            return Resolution::Manual {
                reason: format!("no decision for field {}", conflict.field),
            };
        };
        let value = match choice {
            DecisionChoice::Local => conflict.local.clone(),
            DecisionChoice::Remote => conflict.remote.clone(),
            DecisionChoice::Explicit(value) => value,
        };
        if let Err(err) = conflict.field.assign(&mut merged, value) {
            return Resolution::Manual {
                reason: err.to_string(),
            };
        }
    }
    Resolution::Apply(merged)
}
