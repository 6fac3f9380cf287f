#![forbid(unsafe_code)]
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tb_core::ids::{IssueKey, ProjectKey, TaskId};
use tb_core::{LocalTask, RemoteIssue};
use tb_storage::SqliteStore;
use tb_sync::ports::{
    CollabResult, CreateIssueOptions, IssueQuery, LocalTaskStore, LocalTaskUpdate, NewLocalTask,
    RemoteIssueStore, RemoteIssueUpdate, SearchOptions, SearchResult, TaskFilter, Transition,
    TransitionOptions,
};
use tb_sync::{Clock, CollaboratorError, SyncConfig, SyncEngine};

pub fn id(value: &str) -> TaskId {
    TaskId::try_new(value).expect("task id")
}

pub fn key(value: &str) -> IssueKey {
    IssueKey::try_new(value).expect("issue key")
}

pub fn task(local_id: &str, title: &str, status: &str) -> LocalTask {
    LocalTask {
        id: id(local_id),
        title: title.to_string(),
        description: String::new(),
        status: status.to_string(),
        assignee: None,
        priority: None,
        labels: Vec::new(),
        acceptance_criteria: Vec::new(),
    }
}

pub fn issue(issue_key: &str, summary: &str, status: &str) -> RemoteIssue {
    RemoteIssue {
        key: key(issue_key),
        id: format!("1{}", issue_key.rsplit('-').next().unwrap_or("0")),
        summary: summary.to_string(),
        description: None,
        status: status.to_string(),
        issue_type: "Task".to_string(),
        assignee: None,
        priority: None,
        labels: Vec::new(),
    }
}

pub fn config() -> SyncConfig {
    SyncConfig::for_project("OPS")
}

pub fn engine(local: &FakeLocal, remote: &FakeRemote) -> SyncEngine {
    engine_with(config(), local, remote)
}

pub fn engine_with(config: SyncConfig, local: &FakeLocal, remote: &FakeRemote) -> SyncEngine {
    let store = SqliteStore::open_in_memory().expect("open store");
    SyncEngine::new(config, store, local.clone(), remote.clone()).expect("engine")
}

/// Task `local_id` and issue `issue_key`, both titled `title` in `status`, linked.
pub fn linked_pair(
    engine: &SyncEngine,
    local: &FakeLocal,
    remote: &FakeRemote,
    local_id: &str,
    issue_key: &str,
    title: &str,
    status: &str,
) {
    local.insert(task(local_id, title, status));
    remote.insert(issue(issue_key, title, status));
    engine.link(&id(local_id), &key(issue_key)).expect("link");
}

#[derive(Default)]
struct LocalState {
    tasks: BTreeMap<TaskId, LocalTask>,
    failures: BTreeMap<TaskId, CollaboratorError>,
    next_id: u32,
}

/// In-memory local tracker. Clones share state.
#[derive(Clone, Default)]
pub struct FakeLocal {
    state: Arc<Mutex<LocalState>>,
    updates: Arc<AtomicUsize>,
    creates: Arc<AtomicUsize>,
}

impl FakeLocal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: LocalTask) {
        let mut state = self.state.lock().expect("local state");
        state.tasks.insert(task.id.clone(), task);
    }

    pub fn task(&self, local_id: &str) -> LocalTask {
        let state = self.state.lock().expect("local state");
        state.tasks.get(&id(local_id)).cloned().expect("task exists")
    }

    pub fn edit(&self, local_id: &str, f: impl FnOnce(&mut LocalTask)) {
        let mut state = self.state.lock().expect("local state");
        f(state.tasks.get_mut(&id(local_id)).expect("task exists"));
    }

    pub fn fail(&self, local_id: &str, err: CollaboratorError) {
        let mut state = self.state.lock().expect("local state");
        state.failures.insert(id(local_id), err);
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

impl LocalTaskStore for FakeLocal {
    fn get_task(&self, local_id: &TaskId) -> CollabResult<LocalTask> {
        let state = self.state.lock().expect("local state");
        if let Some(err) = state.failures.get(local_id) {
            return Err(err.clone());
        }
        state
            .tasks
            .get(local_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::not_found(format!("task {local_id} does not exist")))
    }

    fn list_tasks(&self, filter: &TaskFilter) -> CollabResult<Vec<LocalTask>> {
        let state = self.state.lock().expect("local state");
        Ok(state
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    fn update_task(&self, local_id: &TaskId, update: &LocalTaskUpdate) -> CollabResult<()> {
        let mut state = self.state.lock().expect("local state");
        let task = state
            .tasks
            .get_mut(local_id)
            .ok_or_else(|| {
                CollaboratorError::not_found(format!("task {local_id} does not exist"))
            })?;
        update.apply_to(task);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_task(&self, new: &NewLocalTask) -> CollabResult<TaskId> {
        let mut state = self.state.lock().expect("local state");
        state.next_id += 1;
        let local_id = id(&format!("task-new-{}", state.next_id));
        state.tasks.insert(
            local_id.clone(),
            LocalTask {
                id: local_id.clone(),
                title: new.title.clone(),
                description: new.description.clone(),
                status: new.status.clone(),
                assignee: new.assignee.clone(),
                priority: new.priority.clone(),
                labels: new.labels.clone(),
                acceptance_criteria: new.acceptance_criteria.clone(),
            },
        );
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(local_id)
    }
}

struct RemoteState {
    issues: BTreeMap<IssueKey, RemoteIssue>,
    failures: BTreeMap<IssueKey, CollaboratorError>,
    outage: Option<CollaboratorError>,
    workflow: Vec<String>,
    next_number: u32,
    page_size: usize,
}

impl Default for RemoteState {
    fn default() -> Self {
        Self {
            issues: BTreeMap::new(),
            failures: BTreeMap::new(),
            outage: None,
            workflow: ["To Do", "In Progress", "Done"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            next_number: 100,
            page_size: 2,
        }
    }
}

/// In-memory remote tracker with a fixed workflow. Clones share state.
#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<RemoteState>>,
    updates: Arc<AtomicUsize>,
    transitions: Arc<AtomicUsize>,
    creates: Arc<AtomicUsize>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, issue: RemoteIssue) {
        let mut state = self.state.lock().expect("remote state");
        state.issues.insert(issue.key.clone(), issue);
    }

    pub fn issue(&self, issue_key: &str) -> RemoteIssue {
        let state = self.state.lock().expect("remote state");
        state.issues.get(&key(issue_key)).cloned().expect("issue exists")
    }

    pub fn edit(&self, issue_key: &str, f: impl FnOnce(&mut RemoteIssue)) {
        let mut state = self.state.lock().expect("remote state");
        f(state.issues.get_mut(&key(issue_key)).expect("issue exists"));
    }

    pub fn fail(&self, issue_key: &str, err: CollaboratorError) {
        let mut state = self.state.lock().expect("remote state");
        state.failures.insert(key(issue_key), err);
    }

    /// Every read fails with `err` until cleared with `None`.
    pub fn set_outage(&self, err: Option<CollaboratorError>) {
        let mut state = self.state.lock().expect("remote state");
        state.outage = err;
    }

    pub fn set_workflow(&self, statuses: &[&str]) {
        let mut state = self.state.lock().expect("remote state");
        state.workflow = statuses.iter().map(|s| s.to_string()).collect();
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn transitions(&self) -> usize {
        self.transitions.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.updates() + self.transitions() + self.creates()
    }
}

impl RemoteState {
    fn check(&self, issue_key: &IssueKey) -> CollabResult<()> {
        if let Some(err) = &self.outage {
            return Err(err.clone());
        }
        if let Some(err) = self.failures.get(issue_key) {
            return Err(err.clone());
        }
        Ok(())
    }
}

impl RemoteIssueStore for FakeRemote {
    fn get_issue(&self, issue_key: &IssueKey) -> CollabResult<RemoteIssue> {
        let state = self.state.lock().expect("remote state");
        state.check(issue_key)?;
        state
            .issues
            .get(issue_key)
            .cloned()
            .ok_or_else(|| {
                CollaboratorError::not_found(format!("issue {issue_key} does not exist"))
            })
    }

    fn search_issues(
        &self,
        query: &IssueQuery,
        opts: &SearchOptions,
    ) -> CollabResult<SearchResult> {
        let state = self.state.lock().expect("remote state");
        if let Some(err) = &state.outage {
            return Err(err.clone());
        }
        let matching: Vec<RemoteIssue> = state
            .issues
            .values()
            .filter(|i| {
                query
                    .project
                    .as_ref()
                    .is_none_or(|p| i.key.project() == p.as_str())
            })
            .filter(|i| query.summary.as_deref().is_none_or(|s| i.summary == s))
            .cloned()
            .collect();
        let page = opts.max_results.min(state.page_size);
        Ok(SearchResult {
            total: matching.len(),
            issues: matching.into_iter().skip(opts.start_at).take(page).collect(),
        })
    }

    fn update_issue(&self, issue_key: &IssueKey, update: &RemoteIssueUpdate) -> CollabResult<()> {
        let mut state = self.state.lock().expect("remote state");
        state.check(issue_key)?;
        let issue = state
            .issues
            .get_mut(issue_key)
            .ok_or_else(|| {
                CollaboratorError::not_found(format!("issue {issue_key} does not exist"))
            })?;
        if let Some(v) = &update.summary {
            issue.summary = v.clone();
        }
        if let Some(v) = &update.description {
            issue.description = (!v.is_empty()).then(|| v.clone());
        }
        if let Some(v) = &update.assignee {
            issue.assignee = v.clone();
        }
        if let Some(v) = &update.priority {
            issue.priority = v.clone();
        }
        if let Some(v) = &update.labels {
            issue.labels = v.clone();
        }
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn transition_issue(
        &self,
        issue_key: &IssueKey,
        transition_id: &str,
        _opts: &TransitionOptions,
    ) -> CollabResult<()> {
        let mut state = self.state.lock().expect("remote state");
        state.check(issue_key)?;
        let target = transition_id
            .strip_prefix("t-")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| state.workflow.get(n).cloned())
            .ok_or_else(|| {
                CollaboratorError::rejected(format!("unknown transition {transition_id}"))
            })?;
        let issue = state
            .issues
            .get_mut(issue_key)
            .ok_or_else(|| {
                CollaboratorError::not_found(format!("issue {issue_key} does not exist"))
            })?;
        issue.status = target;
        self.transitions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_issue(
        &self,
        project: &ProjectKey,
        issue_type: &str,
        summary: &str,
        opts: &CreateIssueOptions,
    ) -> CollabResult<RemoteIssue> {
        let mut state = self.state.lock().expect("remote state");
        if let Some(err) = &state.outage {
            return Err(err.clone());
        }
        state.next_number += 1;
        let created = RemoteIssue {
            key: key(&format!("{}-{}", project.as_str(), state.next_number)),
            id: format!("1{}", state.next_number),
            summary: summary.to_string(),
            description: opts.description.clone(),
            status: state.workflow.first().cloned().unwrap_or_default(),
            issue_type: issue_type.to_string(),
            assignee: opts.assignee.clone(),
            priority: opts.priority.clone(),
            labels: opts.labels.clone(),
        };
        state.issues.insert(created.key.clone(), created.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    fn get_transitions(&self, issue_key: &IssueKey) -> CollabResult<Vec<Transition>> {
        let state = self.state.lock().expect("remote state");
        state.check(issue_key)?;
        let current = state
            .issues
            .get(issue_key)
            .map(|i| i.status.clone())
            .unwrap_or_default();
        Ok(state
            .workflow
            .iter()
            .enumerate()
            .filter(|(_, status)| **status != current)
            .map(|(n, status)| Transition {
                id: format!("t-{n}"),
                name: format!("Move to {status}"),
                to_status: status.clone(),
            })
            .collect())
    }
}

/// Clock that records requested sleeps instead of sleeping.
#[derive(Default)]
pub struct RecordingClock {
    now_ms: Mutex<i64>,
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleeps").clone()
    }
}

impl Clock for RecordingClock {
    fn now_ms(&self) -> i64 {
        *self.now_ms.lock().expect("now")
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().expect("sleeps").push(duration);
        *self.now_ms.lock().expect("now") += duration.as_millis() as i64;
    }
}
