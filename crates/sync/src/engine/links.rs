#![forbid(unsafe_code)]

use super::SyncEngine;
use crate::error::SyncError;
use crate::ports::{CreateIssueOptions, IssueQuery, NewLocalTask, SearchOptions, TaskFilter};
use crate::view::{LinkedTaskView, RemoteLink};
use serde_json::json;
use std::collections::BTreeMap;
use tb_core::ids::{IssueKey, TaskId};
use tb_core::sync::classify;
use tb_core::{LocalTask, RemoteIssue};
use tb_storage::{MappingRow, OpLogEntry, StoreError};
use tracing::{debug, info, warn};

impl SyncEngine {
    /// Links an existing task to an existing issue. Both must exist; the link is 1:1.
    ///
    /// No baseline is recorded; the next sync classifies the pair as `Unknown`.
    pub fn link(&self, local_id: &TaskId, remote_key: &IssueKey) -> Result<MappingRow, SyncError> {
        self.local.get_task(local_id)?;
        let issue = self.remote.get_issue(remote_key)?;
        let row = self.store().mapping_link(local_id, &issue.key)?;
        info!(local_id = %local_id, remote_key = %issue.key, "linked");
        self.audit(OpLogEntry::new("link", "ok").for_entity(local_id, Some(&issue.key)));
        Ok(row)
    }

    /// Drops the link and its baseline. Neither tracker is touched.
    pub fn unlink(&self, local_id: &TaskId) -> Result<MappingRow, SyncError> {
        let row = self.store().mapping_unlink(local_id)?;
        info!(local_id = %local_id, remote_key = %row.remote_key, "unlinked");
        self.audit(OpLogEntry::new("unlink", "ok").for_entity(local_id, Some(&row.remote_key)));
        Ok(row)
    }

    /// Creates an issue for an unlinked task in the configured project, links the
    /// two and records the pair as the baseline.
    ///
    /// If the status transition after creation fails, the link is kept without a
    /// baseline so the next sync re-establishes one.
    pub fn create_remote(&self, local_id: &TaskId) -> Result<RemoteIssue, SyncError> {
        let existing = self.store().mapping_find(local_id)?;
        if let Some(mapping) = existing {
            return Err(SyncError::Conflict(format!(
                "{local_id} is already linked to {}",
                mapping.remote_key
            )));
        }

        let task = self.local.get_task(local_id)?;
        let payload = self.normalizer.local(&task);
        let description = payload.rendered_description();
        let opts = CreateIssueOptions {
            description: (!description.is_empty()).then_some(description),
            assignee: payload.assignee.clone(),
            priority: payload.priority.clone(),
            labels: payload.labels.iter().cloned().collect(),
        };
        let created = self.remote.create_issue(
            &self.project,
            &self.config.issue_type,
            &payload.title,
            &opts,
        )?;
        self.store().mapping_link(local_id, &created.key)?;
        info!(local_id = %local_id, remote_key = %created.key, "remote issue created");

        let created_status = self
            .normalizer
            .statuses()
            .canonical_from_remote(&created.status);
        if !created_status.eq_ignore_ascii_case(&payload.status) {
            self.writer().transition(&created.key, &payload.status)?;
        }

        let issue = self.remote.get_issue(&created.key)?;
        let remote = self.normalizer.remote(&issue);
        self.commit(local_id, &payload, &remote)?;
        self.audit(
            OpLogEntry::new("create_remote", "ok")
                .for_entity(local_id, Some(&issue.key))
                .with_details(json!({ "issue_type": issue.issue_type })),
        );
        Ok(issue)
    }

    /// Creates a local task from an unlinked issue, links the two and records the baseline.
    pub fn import_remote(&self, remote_key: &IssueKey) -> Result<TaskId, SyncError> {
        let existing = self.store().mapping_find_by_remote(remote_key)?;
        if let Some(mapping) = existing {
            return Err(SyncError::Conflict(format!(
                "{remote_key} is already linked to {}",
                mapping.local_id
            )));
        }

        let issue = self.remote.get_issue(remote_key)?;
        let payload = self.normalizer.remote(&issue);
        let local_id = self.local.create_task(&NewLocalTask::from_payload(&payload))?;
        self.store().mapping_link(&local_id, &issue.key)?;

        let task = self.local.get_task(&local_id)?;
        self.commit(&local_id, &self.normalizer.local(&task), &payload)?;
        info!(local_id = %local_id, remote_key = %issue.key, "local task imported");
        self.audit(OpLogEntry::new("import_remote", "ok").for_entity(&local_id, Some(&issue.key)));
        Ok(local_id)
    }

    /// Links unlinked tasks to unlinked issues of the project whose normalized
    /// summary equals the task's normalized title. Titles shared by more than one
    /// candidate on either side are left alone.
    pub fn discover(&self) -> Result<Vec<MappingRow>, SyncError> {
        let tasks = self.local.list_tasks(&TaskFilter::default())?;
        let issues = self.project_issues()?;

        let mut links = Vec::new();
        {
            let mut store = self.store();
            let mut locals: BTreeMap<String, Vec<&LocalTask>> = BTreeMap::new();
            for task in &tasks {
                if store.mapping_find(&task.id)?.is_none() {
                    let title = self.normalizer.local(task).title;
                    if !title.is_empty() {
                        locals.entry(title).or_default().push(task);
                    }
                }
            }
            let mut remotes: BTreeMap<String, Vec<&RemoteIssue>> = BTreeMap::new();
            for issue in &issues {
                if store.mapping_find_by_remote(&issue.key)?.is_none() {
                    let title = self.normalizer.remote(issue).title;
                    if !title.is_empty() {
                        remotes.entry(title).or_default().push(issue);
                    }
                }
            }

            for (title, candidates) in &locals {
                let unique_remote = remotes.get(title).map(Vec::as_slice);
                let (&[task], Some(&[issue])) = (candidates.as_slice(), unique_remote) else {
                    debug!(title = %title, "no unique match");
                    continue;
                };
                match store.mapping_link(&task.id, &issue.key) {
                    Ok(row) => links.push(row),
                    Err(StoreError::MappingConflict { .. }) => {
                        warn!(
                            local_id = %task.id,
                            remote_key = %issue.key,
                            "discovered pair already linked elsewhere"
                        );
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }

        info!(linked = links.len(), "discovery finished");
        for row in &links {
            self.audit(
                OpLogEntry::new("discover", "linked")
                    .for_entity(&row.local_id, Some(&row.remote_key)),
            );
        }
        self.audit(
            OpLogEntry::new("discover", "ok").with_details(json!({ "linked": links.len() })),
        );
        Ok(links)
    }

    /// The task together with its remote link and current sync state.
    pub fn linked_view(&self, local_id: &TaskId) -> Result<LinkedTaskView, SyncError> {
        let task = self.local.get_task(local_id)?;
        let mapping = self.store().mapping_find(local_id)?;
        let Some(mapping) = mapping else {
            return Ok(LinkedTaskView {
                task,
                remote: None,
                state: None,
                conflict_state: None,
            });
        };

        let issue = self.remote.get_issue(&mapping.remote_key)?;
        let (baseline, sync_state) = {
            let store = self.store();
            (store.baseline_get(local_id)?, store.sync_state_get(local_id)?)
        };
        let state = classify(
            &self.normalizer.local(&task).hash(),
            &self.normalizer.remote(&issue).hash(),
            baseline.local_hash(),
            baseline.remote_hash(),
        );
        Ok(LinkedTaskView {
            task,
            remote: Some(RemoteLink {
                key: issue.key,
                status: issue.status,
                issue_type: issue.issue_type,
            }),
            state: Some(state),
            conflict_state: sync_state.and_then(|s| s.conflict_state),
        })
    }

    /// Every issue of the configured project, following pagination.
    fn project_issues(&self) -> Result<Vec<RemoteIssue>, SyncError> {
        let query = IssueQuery::project(&self.project);
        let mut opts = SearchOptions::default();
        let mut out = Vec::new();
        loop {
            let page = self.remote.search_issues(&query, &opts)?;
            let fetched = page.issues.len();
            out.extend(
                page.issues
                    .into_iter()
                    .filter(|issue| issue.key.project() == self.project.as_str()),
            );
            opts.start_at += fetched;
            if fetched == 0 || opts.start_at >= page.total {
                break;
            }
        }
        Ok(out)
    }
}
