#![forbid(unsafe_code)]

use serde::Serialize;
use serde_json::{Value, json};
use tb_core::ids::{IssueKey, TaskId};
use tb_core::sync::{SyncState, TrackedField};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// Nothing to transfer.
    Noop,
    /// First sync: record both sides as the baseline.
    Baseline,
    Push,
    Pull,
    /// Conflict settled by the strategy; one or both sides written.
    Resolve,
    /// Conflict left for a human; entity flagged.
    MarkManual,
}

impl SyncAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncAction::Noop => "noop",
            SyncAction::Baseline => "baseline",
            SyncAction::Push => "push",
            SyncAction::Pull => "pull",
            SyncAction::Resolve => "resolve",
            SyncAction::MarkManual => "mark_manual",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncedEntity {
    pub local_id: TaskId,
    pub remote_key: IssueKey,
    pub state: SyncState,
    pub action: SyncAction,
    pub wrote_local: bool,
    pub wrote_remote: bool,
}

impl SyncedEntity {
    pub fn wrote(&self) -> bool {
        self.wrote_local || self.wrote_remote
    }
}

/// An entity still in conflict after this run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConflictEntity {
    pub local_id: TaskId,
    pub remote_key: IssueKey,
    pub fields: Vec<TrackedField>,
    pub reason: String,
    /// `true` when the entity was flagged for manual resolution in the store.
    pub marked_manual: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedEntity {
    pub local_id: TaskId,
    pub remote_key: Option<IssueKey>,
    pub kind: &'static str,
    pub message: String,
    pub rate_limited: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedEntity {
    pub local_id: TaskId,
    pub reason: String,
}

/// What a dry run would have done.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    pub local_id: TaskId,
    pub remote_key: IssueKey,
    pub state: SyncState,
    pub action: SyncAction,
    pub fields: Vec<TrackedField>,
}

/// Per-entity outcome of one push, pull or sync run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub synced: Vec<SyncedEntity>,
    pub conflicts: Vec<ConflictEntity>,
    pub failed: Vec<FailedEntity>,
    pub skipped: Vec<SkippedEntity>,
    pub planned: Vec<PlannedAction>,
}

impl SyncReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// 0 on full success, 1 when any entity failed.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_failures())
    }

    pub fn rate_limited(&self) -> bool {
        self.failed.iter().any(|f| f.rate_limited)
    }

    pub fn writes(&self) -> usize {
        self.synced.iter().filter(|s| s.wrote()).count()
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "synced={} conflicts={} failed={} skipped={}",
            self.synced.len(),
            self.conflicts.len(),
            self.failed.len(),
            self.skipped.len()
        );
        if self.dry_run {
            out.push_str(&format!(" planned={} (dry run)", self.planned.len()));
        }
        out
    }

    pub(crate) fn counts_json(&self) -> Value {
        json!({
            "dry_run": self.dry_run,
            "synced": self.synced.len(),
            "conflicts": self.conflicts.len(),
            "failed": self.failed.len(),
            "skipped": self.skipped.len(),
            "planned": self.planned.len(),
            "writes": self.writes(),
        })
    }
}
