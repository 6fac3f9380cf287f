#![forbid(unsafe_code)]

//! Collaborator interfaces for the two trackers.
//!
//! Both are called from several worker threads at once, one entity per thread.
//! Timeouts and retries inside a single call belong to the implementation.

use crate::error::CollaboratorError;
use tb_core::ids::{IssueKey, ProjectKey, TaskId};
use tb_core::sync::CanonicalPayload;
use tb_core::{AcceptanceCriterion, LocalTask, RemoteIssue};

pub type CollabResult<T> = Result<T, CollaboratorError>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<String>,
    pub label: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &LocalTask) -> bool {
        let status_ok = self
            .status
            .as_deref()
            .is_none_or(|s| task.status.eq_ignore_ascii_case(s));
        let label_ok = self
            .label
            .as_deref()
            .is_none_or(|l| task.labels.iter().any(|have| have == l));
        status_ok && label_ok
    }
}

/// Fields to overwrite on a local task; `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalTaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub assignee: Option<Option<String>>,
    pub priority: Option<Option<String>>,
    pub labels: Option<Vec<String>>,
    pub acceptance_criteria: Option<Vec<AcceptanceCriterion>>,
}

impl LocalTaskUpdate {
    /// Every synced field set to the payload's value.
    pub fn from_payload(payload: &CanonicalPayload) -> Self {
        Self {
            title: Some(payload.title.clone()),
            description: Some(payload.description.clone()),
            status: Some(payload.status.clone()),
            assignee: Some(payload.assignee.clone()),
            priority: Some(payload.priority.clone()),
            labels: Some(payload.labels.iter().cloned().collect()),
            acceptance_criteria: Some(payload.acceptance_criteria.clone()),
        }
    }

    pub fn apply_to(&self, task: &mut LocalTask) {
        if let Some(v) = &self.title {
            task.title = v.clone();
        }
        if let Some(v) = &self.description {
            task.description = v.clone();
        }
        if let Some(v) = &self.status {
            task.status = v.clone();
        }
        if let Some(v) = &self.assignee {
            task.assignee = v.clone();
        }
        if let Some(v) = &self.priority {
            task.priority = v.clone();
        }
        if let Some(v) = &self.labels {
            task.labels = v.clone();
        }
        if let Some(v) = &self.acceptance_criteria {
            task.acceptance_criteria = v.clone();
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewLocalTask {
    pub title: String,
    pub description: String,
    pub status: String,
    pub assignee: Option<String>,
    pub priority: Option<String>,
    pub labels: Vec<String>,
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
}

impl NewLocalTask {
    pub fn from_payload(payload: &CanonicalPayload) -> Self {
        Self {
            title: payload.title.clone(),
            description: payload.description.clone(),
            status: payload.status.clone(),
            assignee: payload.assignee.clone(),
            priority: payload.priority.clone(),
            labels: payload.labels.iter().cloned().collect(),
            acceptance_criteria: payload.acceptance_criteria.clone(),
        }
    }
}

pub trait LocalTaskStore: Send + Sync {
    fn get_task(&self, id: &TaskId) -> CollabResult<LocalTask>;
    fn list_tasks(&self, filter: &TaskFilter) -> CollabResult<Vec<LocalTask>>;
    fn update_task(&self, id: &TaskId, update: &LocalTaskUpdate) -> CollabResult<()>;
    fn create_task(&self, task: &NewLocalTask) -> CollabResult<TaskId>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IssueQuery {
    pub project: Option<ProjectKey>,
    pub summary: Option<String>,
}

impl IssueQuery {
    pub fn project(project: &ProjectKey) -> Self {
        Self {
            project: Some(project.clone()),
            summary: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchOptions {
    pub start_at: usize,
    pub max_results: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            start_at: 0,
            max_results: 50,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub issues: Vec<RemoteIssue>,
    /// Matches across all pages.
    pub total: usize,
}

/// Fields to overwrite on a remote issue. Status changes go through transitions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteIssueUpdate {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub assignee: Option<Option<String>>,
    pub priority: Option<Option<String>>,
    pub labels: Option<Vec<String>>,
}

impl RemoteIssueUpdate {
    pub fn from_payload(payload: &CanonicalPayload) -> Self {
        Self {
            summary: Some(payload.title.clone()),
            description: Some(payload.rendered_description()),
            assignee: Some(payload.assignee.clone()),
            priority: Some(payload.priority.clone()),
            labels: Some(payload.labels.iter().cloned().collect()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub id: String,
    pub name: String,
    /// Status the issue lands in after this transition.
    pub to_status: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionOptions {
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateIssueOptions {
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub priority: Option<String>,
    pub labels: Vec<String>,
}

pub trait RemoteIssueStore: Send + Sync {
    fn get_issue(&self, key: &IssueKey) -> CollabResult<RemoteIssue>;
    fn search_issues(&self, query: &IssueQuery, opts: &SearchOptions) -> CollabResult<SearchResult>;
    fn update_issue(&self, key: &IssueKey, update: &RemoteIssueUpdate) -> CollabResult<()>;
    fn transition_issue(
        &self,
        key: &IssueKey,
        transition_id: &str,
        opts: &TransitionOptions,
    ) -> CollabResult<()>;
    fn create_issue(
        &self,
        project: &ProjectKey,
        issue_type: &str,
        summary: &str,
        opts: &CreateIssueOptions,
    ) -> CollabResult<RemoteIssue>;
    fn get_transitions(&self, key: &IssueKey) -> CollabResult<Vec<Transition>>;
}
