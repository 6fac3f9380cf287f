#![forbid(unsafe_code)]

use super::{MANUAL_RESOLUTION_REQUIRED, Outcome, SyncEngine};
use crate::error::SyncError;
use crate::report::{ConflictEntity, PlannedAction, SkippedEntity, SyncAction, SyncedEntity};
use crate::resolver::{ConflictContext, Resolution, Strategy, resolve_conflict};
use tb_core::ids::{IssueKey, TaskId};
use tb_core::sync::{
    CanonicalPayload, FieldConflict, SyncState, TrackedField, classify, detect_field_conflicts,
};
use tb_core::{LocalTask, RemoteIssue};
use tb_storage::Baseline;
use tracing::{debug, info};

/// Everything known about one mapped entity at the start of its sync.
struct Current {
    id: TaskId,
    remote_key: IssueKey,
    issue: RemoteIssue,
    local: CanonicalPayload,
    remote: CanonicalPayload,
    baseline: Baseline,
    state: SyncState,
}

#[derive(Clone, Copy)]
enum Direction {
    Push,
    Pull,
}

impl Current {
    fn synced(&self, action: SyncAction, wrote_local: bool, wrote_remote: bool) -> Outcome {
        Outcome::Synced(SyncedEntity {
            local_id: self.id.clone(),
            remote_key: self.remote_key.clone(),
            state: self.state,
            action,
            wrote_local,
            wrote_remote,
        })
    }

    fn planned(&self, action: SyncAction, fields: Vec<TrackedField>) -> Outcome {
        Outcome::Planned(PlannedAction {
            local_id: self.id.clone(),
            remote_key: self.remote_key.clone(),
            state: self.state,
            action,
            fields,
        })
    }

    fn skipped(&self, reason: &str) -> Outcome {
        Outcome::Skipped(SkippedEntity {
            local_id: self.id.clone(),
            reason: reason.to_string(),
        })
    }

    fn conflict(&self, fields: Vec<TrackedField>, reason: String, marked_manual: bool) -> Outcome {
        Outcome::Conflict(ConflictEntity {
            local_id: self.id.clone(),
            remote_key: self.remote_key.clone(),
            fields,
            reason,
            marked_manual,
        })
    }

    /// Field conflicts against the baseline pair; empty when no full baseline exists.
    fn field_conflicts(&self) -> Vec<FieldConflict> {
        match (&self.baseline.local, &self.baseline.remote) {
            (Some(base_local), Some(base_remote)) => detect_field_conflicts(
                &self.local,
                &self.remote,
                &base_local.payload,
                &base_remote.payload,
            ),
            _ => Vec::new(),
        }
    }
}

fn not_linked(id: &TaskId) -> Outcome {
    Outcome::Skipped(SkippedEntity {
        local_id: id.clone(),
        reason: "not linked to a remote issue".to_string(),
    })
}

fn field_names(conflicts: &[FieldConflict]) -> Vec<TrackedField> {
    conflicts.iter().map(|c| c.field).collect()
}

impl SyncEngine {
    pub(super) fn sync_one(
        &self,
        id: &TaskId,
        strategy: Strategy,
        dry_run: bool,
    ) -> Result<Outcome, SyncError> {
        let Some(current) = self.load(id)? else {
            return Ok(not_linked(id));
        };
        match current.state {
            SyncState::InSync => Ok(current.synced(SyncAction::Noop, false, false)),
            SyncState::Unknown if dry_run => Ok(current.planned(SyncAction::Baseline, Vec::new())),
            SyncState::Unknown => self.establish_baseline(&current),
            SyncState::NeedsPush if dry_run => Ok(current.planned(SyncAction::Push, Vec::new())),
            SyncState::NeedsPush => self.transfer(&current, Direction::Push),
            SyncState::NeedsPull if dry_run => Ok(current.planned(SyncAction::Pull, Vec::new())),
            SyncState::NeedsPull => self.transfer(&current, Direction::Pull),
            SyncState::Conflict if dry_run => {
                let action = if strategy == Strategy::Manual {
                    SyncAction::MarkManual
                } else {
                    SyncAction::Resolve
                };
                Ok(current.planned(action, field_names(&current.field_conflicts())))
            }
            SyncState::Conflict => self.resolve(&current, strategy),
        }
    }

    pub(super) fn push_one(
        &self,
        id: &TaskId,
        force: bool,
        dry_run: bool,
    ) -> Result<Outcome, SyncError> {
        self.one_way(id, Direction::Push, force, dry_run)
    }

    pub(super) fn pull_one(
        &self,
        id: &TaskId,
        force: bool,
        dry_run: bool,
    ) -> Result<Outcome, SyncError> {
        self.one_way(id, Direction::Pull, force, dry_run)
    }

    fn one_way(
        &self,
        id: &TaskId,
        direction: Direction,
        force: bool,
        dry_run: bool,
    ) -> Result<Outcome, SyncError> {
        let Some(current) = self.load(id)? else {
            return Ok(not_linked(id));
        };
        let (action, opposite) = match direction {
            Direction::Push => (SyncAction::Push, SyncState::NeedsPull),
            Direction::Pull => (SyncAction::Pull, SyncState::NeedsPush),
        };
        if !force {
            match current.state {
                SyncState::InSync => return Ok(current.synced(SyncAction::Noop, false, false)),
                SyncState::Conflict => {
                    let fields = field_names(&current.field_conflicts());
                    let reason = format!(
                        "{} changed on both sides; run sync or {} with force",
                        current.id,
                        action.as_str()
                    );
                    return Ok(current.conflict(fields, reason, false));
                }
                state if state == opposite => {
                    return Ok(current.skipped(match direction {
                        Direction::Push => "remote changed since last sync; pull instead",
                        Direction::Pull => "local changed since last sync; push instead",
                    }));
                }
                _ => {}
            }
        }
        if dry_run {
            return Ok(current.planned(action, Vec::new()));
        }
        self.transfer(&current, direction)
    }

    fn load(&self, id: &TaskId) -> Result<Option<Current>, SyncError> {
        let mapping = self.store().mapping_find(id)?;
        let Some(mapping) = mapping else {
            return Ok(None);
        };
        let task: LocalTask = self.local.get_task(id)?;
        let issue = self.remote.get_issue(&mapping.remote_key)?;
        let local = self.normalizer.local(&task);
        let remote = self.normalizer.remote(&issue);
        let baseline = self.store().baseline_get(id)?;
        let state = classify(
            &local.hash(),
            &remote.hash(),
            baseline.local_hash(),
            baseline.remote_hash(),
        );
        debug!(local_id = %id, remote_key = %mapping.remote_key, state = %state, "classified");
        Ok(Some(Current {
            id: id.clone(),
            remote_key: mapping.remote_key,
            issue,
            local,
            remote,
            baseline,
            state,
        }))
    }

    fn establish_baseline(&self, current: &Current) -> Result<Outcome, SyncError> {
        self.commit(&current.id, &current.local, &current.remote)?;
        info!(local_id = %current.id, remote_key = %current.remote_key, "baseline established");
        Ok(current.synced(SyncAction::Baseline, false, false))
    }

    /// Copies one whole side onto the other, then records the re-read pair as baseline.
    fn transfer(&self, current: &Current, direction: Direction) -> Result<Outcome, SyncError> {
        let writer = self.writer();
        match direction {
            Direction::Push => {
                let transition = writer.plan_transition(&current.issue, &current.local)?;
                let issue = writer.write_remote(
                    &current.remote_key,
                    &current.local,
                    transition.as_deref(),
                )?;
                let remote = self.normalizer.remote(&issue);
                self.commit(&current.id, &current.local, &remote)?;
                info!(
                    local_id = %current.id,
                    remote_key = %current.remote_key,
                    action = "push",
                    "entity synced"
                );
                Ok(current.synced(SyncAction::Push, false, true))
            }
            Direction::Pull => {
                let task = writer.write_local(&current.id, &current.remote)?;
                let local = self.normalizer.local(&task);
                self.commit(&current.id, &local, &current.remote)?;
                info!(
                    local_id = %current.id,
                    remote_key = %current.remote_key,
                    action = "pull",
                    "entity synced"
                );
                Ok(current.synced(SyncAction::Pull, true, false))
            }
        }
    }

    fn resolve(&self, current: &Current, strategy: Strategy) -> Result<Outcome, SyncError> {
        let (Some(base_local), Some(base_remote)) =
            (&current.baseline.local, &current.baseline.remote)
        else {
            // Only a full baseline pair classifies as Conflict.
            return self.establish_baseline(current);
        };
        let conflicts = detect_field_conflicts(
            &current.local,
            &current.remote,
            &base_local.payload,
            &base_remote.payload,
        );
        let ctx = ConflictContext {
            entity: &current.id,
            local: &current.local,
            remote: &current.remote,
            baseline_local: &base_local.payload,
            baseline_remote: &base_remote.payload,
        };
        debug!(
            local_id = %current.id,
            strategy = %strategy,
            fields = conflicts.len(),
            "resolving conflict"
        );

        match resolve_conflict(strategy, ctx, &conflicts, self.decisions.as_ref()) {
            Resolution::Manual { reason } => {
                self.store()
                    .sync_state_mark_conflict(&current.id, MANUAL_RESOLUTION_REQUIRED)?;
                info!(
                    local_id = %current.id,
                    remote_key = %current.remote_key,
                    reason = %reason,
                    "conflict left for manual resolution"
                );
                Ok(current.conflict(field_names(&conflicts), reason, true))
            }
            Resolution::Apply(merged) => {
                let writer = self.writer();
                let mut local = current.local.clone();
                let mut remote = current.remote.clone();
                let wrote_local = current.local != merged;
                let wrote_remote = current.remote != merged;
                let transition = if wrote_remote {
                    writer.plan_transition(&current.issue, &merged)?
                } else {
                    None
                };
                if wrote_local {
                    let task = writer.write_local(&current.id, &merged)?;
                    local = self.normalizer.local(&task);
                }
                if wrote_remote {
                    let issue =
                        writer.write_remote(&current.remote_key, &merged, transition.as_deref())?;
                    remote = self.normalizer.remote(&issue);
                }
                self.commit(&current.id, &local, &remote)?;
                info!(
                    local_id = %current.id,
                    remote_key = %current.remote_key,
                    strategy = %strategy,
                    wrote_local,
                    wrote_remote,
                    "conflict resolved"
                );
                Ok(current.synced(SyncAction::Resolve, wrote_local, wrote_remote))
            }
        }
    }

    /// Both snapshots and the sync state land together or not at all.
    pub(super) fn commit(
        &self,
        id: &TaskId,
        local: &CanonicalPayload,
        remote: &CanonicalPayload,
    ) -> Result<(), SyncError> {
        self.store().baseline_commit(id, local, remote)?;
        Ok(())
    }
}
