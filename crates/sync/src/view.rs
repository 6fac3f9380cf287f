#![forbid(unsafe_code)]

use tb_core::LocalTask;
use tb_core::ids::IssueKey;
use tb_core::sync::SyncState;

/// Remote metadata shown next to a linked local task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteLink {
    pub key: IssueKey,
    pub status: String,
    pub issue_type: String,
}

/// A local task composed with its remote counterpart for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkedTaskView {
    pub task: LocalTask,
    pub remote: Option<RemoteLink>,
    /// `None` when the task is not linked.
    pub state: Option<SyncState>,
    pub conflict_state: Option<String>,
}

impl LinkedTaskView {
    pub fn is_linked(&self) -> bool {
        self.remote.is_some()
    }
}
