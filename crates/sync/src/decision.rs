#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use tb_core::ids::TaskId;
use tb_core::sync::{FieldConflict, FieldValue, TrackedField};

/// Which value wins one conflicting field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecisionChoice {
    Local,
    Remote,
    Explicit(FieldValue),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDecision {
    pub field: TrackedField,
    pub choice: DecisionChoice,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecisionUnavailable {
    #[error("no interactive decision source is available")]
    NoSource,
    #[error("decision was cancelled")]
    Cancelled,
}

/// Answers field conflicts for the `prompt` strategy.
///
/// Implementations may be a terminal UI, a scripted double, or [`AutoDecline`].
/// Calls for different entities may arrive concurrently.
pub trait DecisionSource: Send + Sync {
    fn resolve(
        &self,
        entity: &TaskId,
        conflicts: &[FieldConflict],
    ) -> Result<Vec<FieldDecision>, DecisionUnavailable>;
}

/// Declines every prompt, so conflicts fall back to manual resolution.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoDecline;

impl DecisionSource for AutoDecline {
    fn resolve(
        &self,
        _entity: &TaskId,
        _conflicts: &[FieldConflict],
    ) -> Result<Vec<FieldDecision>, DecisionUnavailable> {
        Err(DecisionUnavailable::NoSource)
    }
}

/// Fixed per-field answers, for non-interactive runs.
///
/// Only fields present in a conflict are answered; fields without a scripted
/// choice are left out of the reply.
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    choices: Vec<FieldDecision>,
    cancelled: bool,
    calls: AtomicUsize,
}

impl ScriptedDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_decisions(choices: Vec<FieldDecision>) -> Self {
        Self {
            choices,
            ..Self::default()
        }
    }

    /// Every call reports [`DecisionUnavailable::Cancelled`].
    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }

    pub fn choose(mut self, field: TrackedField, choice: DecisionChoice) -> Self {
        self.choices.retain(|d| d.field != field);
        self.choices.push(FieldDecision { field, choice });
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl DecisionSource for ScriptedDecisions {
    fn resolve(
        &self,
        _entity: &TaskId,
        conflicts: &[FieldConflict],
    ) -> Result<Vec<FieldDecision>, DecisionUnavailable> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.cancelled {
            return Err(DecisionUnavailable::Cancelled);
        }
        Ok(conflicts
            .iter()
            .filter_map(|c| self.choices.iter().find(|d| d.field == c.field).cloned())
            .collect())
    }
}
