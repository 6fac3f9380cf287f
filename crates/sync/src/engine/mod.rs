#![forbid(unsafe_code)]

mod entity;
mod links;

use crate::apply::Writer;
use crate::config::SyncConfig;
use crate::decision::{AutoDecline, DecisionSource};
use crate::error::SyncError;
use crate::ports::{LocalTaskStore, RemoteIssueStore};
use crate::report::{
    ConflictEntity, FailedEntity, PlannedAction, SkippedEntity, SyncAction, SyncReport,
    SyncedEntity,
};
use crate::resolver::Strategy;
use crate::support::{now_ms, ts_ms_to_rfc3339};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tb_core::ids::{IssueKey, ProjectKey, TaskId};
use tb_core::sync::Normalizer;
use tb_storage::{OpLogEntry, SqliteStore};
use tracing::{debug, info, warn};

/// `sync_state.conflict_state` of an entity waiting for a human.
pub const MANUAL_RESOLUTION_REQUIRED: &str = "manual-resolution-required";

/// Drives mapped entities through classify, act and baseline update.
///
/// Entities are processed in chunks of `batch_width`, each entity on its own
/// scoped thread; a chunk finishes before the next starts. One entity's
/// failure is recorded in the report and never aborts the run.
pub struct SyncEngine {
    config: SyncConfig,
    project: ProjectKey,
    normalizer: Normalizer,
    store: Mutex<SqliteStore>,
    local: Box<dyn LocalTaskStore>,
    remote: Box<dyn RemoteIssueStore>,
    decisions: Box<dyn DecisionSource>,
}

/// What happened to one entity, short of an error.
pub(crate) enum Outcome {
    Synced(SyncedEntity),
    Conflict(ConflictEntity),
    Skipped(SkippedEntity),
    Planned(PlannedAction),
}

impl SyncEngine {
    /// Validates `config` up front; an invalid config never reaches an entity.
    pub fn new(
        config: SyncConfig,
        store: SqliteStore,
        local: impl LocalTaskStore + 'static,
        remote: impl RemoteIssueStore + 'static,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let project = config.project()?;
        let normalizer = Normalizer::new(config.statuses());
        Ok(Self {
            config,
            project,
            normalizer,
            store: Mutex::new(store),
            local: Box::new(local),
            remote: Box::new(remote),
            decisions: Box::new(AutoDecline),
        })
    }

    /// Decision source for the `prompt` strategy. Defaults to [`AutoDecline`].
    pub fn with_decisions(mut self, decisions: impl DecisionSource + 'static) -> Self {
        self.decisions = Box::new(decisions);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn project(&self) -> &ProjectKey {
        &self.project
    }

    pub fn with_store<R>(&self, f: impl FnOnce(&SqliteStore) -> R) -> R {
        f(&self.store())
    }

    pub fn into_store(self) -> SqliteStore {
        self.store
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mapped_ids(&self) -> Result<Vec<TaskId>, SyncError> {
        let mappings = self.store().mapping_list()?;
        Ok(mappings.into_iter().map(|m| m.local_id).collect())
    }

    /// Bidirectional sync of `ids`; conflicts are settled by `strategy`.
    pub fn sync_all(&self, ids: &[TaskId], strategy: Strategy, dry_run: bool) -> SyncReport {
        self.run_batch("sync", ids, dry_run, Some(strategy), |id| {
            self.sync_one(id, strategy, dry_run)
        })
    }

    /// [`Self::sync_all`] over every mapped entity.
    pub fn sync_mapped(&self, strategy: Strategy, dry_run: bool) -> Result<SyncReport, SyncError> {
        let ids = self.mapped_ids()?;
        Ok(self.sync_all(&ids, strategy, dry_run))
    }

    /// Local to remote. Without `force`, conflicting entities are reported and
    /// entities with remote-only changes are skipped.
    pub fn push(&self, ids: &[TaskId], force: bool, dry_run: bool) -> SyncReport {
        self.run_batch("push", ids, dry_run, None, |id| self.push_one(id, force, dry_run))
    }

    /// Remote to local; mirror image of [`Self::push`].
    pub fn pull(&self, ids: &[TaskId], force: bool, dry_run: bool) -> SyncReport {
        self.run_batch("pull", ids, dry_run, None, |id| self.pull_one(id, force, dry_run))
    }

    fn store(&self) -> MutexGuard<'_, SqliteStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn writer(&self) -> Writer<'_> {
        Writer {
            local: self.local.as_ref(),
            remote: self.remote.as_ref(),
            normalizer: &self.normalizer,
        }
    }

    fn run_batch<F>(
        &self,
        operation: &'static str,
        ids: &[TaskId],
        dry_run: bool,
        strategy: Option<Strategy>,
        per_entity: F,
    ) -> SyncReport
    where
        F: Fn(&TaskId) -> Result<Outcome, SyncError> + Sync,
    {
        let mut seen = BTreeSet::new();
        let ids: Vec<&TaskId> = ids.iter().filter(|id| seen.insert(*id)).collect();
        let width = self.config.batch_width.max(1);
        let per_entity = &per_entity;

        let mut report = SyncReport {
            dry_run,
            ..SyncReport::default()
        };
        for chunk in ids.chunks(width) {
            debug!(operation, entities = chunk.len(), "starting batch");
            let results: Vec<(TaskId, Result<Outcome, SyncError>)> = std::thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|&id| (id, scope.spawn(move || per_entity(id))))
                    .collect();
                handles
                    .into_iter()
                    .map(|(id, handle)| {
                        let result = handle.join().unwrap_or_else(|_| {
                            Err(SyncError::Collaborator(format!("worker for {id} panicked")))
                        });
                        (id.clone(), result)
                    })
                    .collect()
            });
            for (id, result) in results {
                self.record(&mut report, operation, id, result, dry_run);
            }
        }

        info!(
            operation,
            dry_run,
            synced = report.synced.len(),
            conflicts = report.conflicts.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "run finished"
        );
        let mut details = report.counts_json();
        details["strategy"] = json!(strategy.map(Strategy::as_str));
        details["finished_at"] = json!(ts_ms_to_rfc3339(now_ms()));
        let outcome = if report.has_failures() { "partial" } else { "ok" };
        self.audit(OpLogEntry::new(operation, outcome).with_details(details));
        report
    }

    fn record(
        &self,
        report: &mut SyncReport,
        operation: &'static str,
        id: TaskId,
        result: Result<Outcome, SyncError>,
        dry_run: bool,
    ) {
        match result {
            Ok(Outcome::Synced(entity)) => {
                if !dry_run && (entity.wrote() || entity.action == SyncAction::Baseline) {
                    self.audit(
                        OpLogEntry::new(operation, "ok")
                            .for_entity(&entity.local_id, Some(&entity.remote_key))
                            .with_details(json!({
                                "action": entity.action.as_str(),
                                "state": entity.state.as_str(),
                                "wrote_local": entity.wrote_local,
                                "wrote_remote": entity.wrote_remote,
                            })),
                    );
                }
                report.synced.push(entity);
            }
            Ok(Outcome::Conflict(conflict)) => {
                if conflict.marked_manual {
                    self.audit(
                        OpLogEntry::new(operation, MANUAL_RESOLUTION_REQUIRED)
                            .for_entity(&conflict.local_id, Some(&conflict.remote_key))
                            .with_details(json!({
                                "fields": conflict.fields,
                                "reason": conflict.reason,
                            })),
                    );
                }
                report.conflicts.push(conflict);
            }
            Ok(Outcome::Skipped(skipped)) => report.skipped.push(skipped),
            Ok(Outcome::Planned(planned)) => report.planned.push(planned),
            Err(err) => {
                let remote_key = self.remote_key_of(&id);
                warn!(local_id = %id, kind = err.kind(), error = %err, "entity failed");
                if !dry_run {
                    self.audit(
                        OpLogEntry::new(operation, "failed")
                            .for_entity(&id, remote_key.as_ref())
                            .with_details(json!({
                                "kind": err.kind(),
                                "message": err.to_string(),
                            })),
                    );
                }
                report.failed.push(FailedEntity {
                    local_id: id,
                    remote_key,
                    kind: err.kind(),
                    message: err.to_string(),
                    rate_limited: err.is_rate_limited(),
                });
            }
        }
    }

    fn remote_key_of(&self, id: &TaskId) -> Option<IssueKey> {
        let mapping = self.store().mapping_find(id).ok().flatten();
        mapping.map(|m| m.remote_key)
    }

    /// Best effort: an audit failure is logged and never fails the operation it records.
    fn audit(&self, entry: OpLogEntry) {
        let appended = self.store().ops_log_append(&entry);
        if let Err(err) = appended {
            warn!(operation = %entry.operation, error = %err, "audit append failed");
        }
    }
}
