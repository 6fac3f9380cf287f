#![forbid(unsafe_code)]

use crate::error::SyncError;
use crate::ports::{
    LocalTaskStore, LocalTaskUpdate, RemoteIssueStore, RemoteIssueUpdate, TransitionOptions,
};
use tb_core::ids::{IssueKey, TaskId};
use tb_core::sync::{CanonicalPayload, Normalizer};
use tb_core::{LocalTask, RemoteIssue};
use tracing::debug;

/// Writes canonical payloads through the trackers' own APIs and reads back the result.
pub(crate) struct Writer<'a> {
    pub local: &'a dyn LocalTaskStore,
    pub remote: &'a dyn RemoteIssueStore,
    pub normalizer: &'a Normalizer,
}

impl Writer<'_> {
    /// Overwrites the local task with `target` and returns the task as re-read.
    pub fn write_local(
        &self,
        id: &TaskId,
        target: &CanonicalPayload,
    ) -> Result<LocalTask, SyncError> {
        self.local
            .update_task(id, &LocalTaskUpdate::from_payload(target))?;
        debug!(local_id = %id, "local task updated");
        Ok(self.local.get_task(id)?)
    }

    /// Transition id needed to move `current` to the status of `target`, if any.
    ///
    /// Resolved before anything is written so an unreachable status leaves both
    /// sides untouched.
    pub fn plan_transition(
        &self,
        current: &RemoteIssue,
        target: &CanonicalPayload,
    ) -> Result<Option<String>, SyncError> {
        let current_status = self.normalizer.statuses().canonical_from_remote(&current.status);
        if current_status.eq_ignore_ascii_case(&target.status) {
            return Ok(None);
        }
        self.find_transition(&current.key, &target.status).map(Some)
    }

    /// Overwrites the remote issue with `target`, applies the planned transition
    /// and returns the issue as re-read.
    pub fn write_remote(
        &self,
        key: &IssueKey,
        target: &CanonicalPayload,
        transition: Option<&str>,
    ) -> Result<RemoteIssue, SyncError> {
        self.remote
            .update_issue(key, &RemoteIssueUpdate::from_payload(target))?;
        if let Some(transition_id) = transition {
            self.remote
                .transition_issue(key, transition_id, &TransitionOptions::default())?;
            debug!(remote_key = %key, transition = %transition_id, "issue transitioned");
        }
        debug!(remote_key = %key, "remote issue updated");
        Ok(self.remote.get_issue(key)?)
    }

    /// Moves an issue to the remote name of a canonical status.
    pub fn transition(&self, key: &IssueKey, canonical_status: &str) -> Result<(), SyncError> {
        let transition_id = self.find_transition(key, canonical_status)?;
        self.remote
            .transition_issue(key, &transition_id, &TransitionOptions::default())?;
        debug!(
            remote_key = %key,
            status = %canonical_status,
            transition = %transition_id,
            "issue transitioned"
        );
        Ok(())
    }

    fn find_transition(
        &self,
        key: &IssueKey,
        canonical_status: &str,
    ) -> Result<String, SyncError> {
        let wanted = self.normalizer.statuses().remote_name(canonical_status);
        let transitions = self.remote.get_transitions(key)?;
        transitions
            .into_iter()
            .find(|t| {
                t.to_status.eq_ignore_ascii_case(&wanted) || t.name.eq_ignore_ascii_case(&wanted)
            })
            .map(|t| t.id)
            .ok_or_else(|| SyncError::Transition {
                key: key.to_string(),
                status: wanted,
            })
    }
}
