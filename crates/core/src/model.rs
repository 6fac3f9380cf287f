#![forbid(unsafe_code)]

use crate::ids::{IssueKey, TaskId};
use serde::{Deserialize, Serialize};

/// Which system a record or snapshot belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Local => "local",
            Side::Remote => "remote",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "local" => Some(Side::Local),
            "remote" => Some(Side::Remote),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Local => Side::Remote,
            Side::Remote => Side::Local,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCriterion {
    pub index: u32,
    pub text: String,
    pub checked: bool,
}

/// A task as the local tracker reports it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalTask {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: String,
    pub assignee: Option<String>,
    pub priority: Option<String>,
    pub labels: Vec<String>,
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
}

/// An issue as the remote tracker reports it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteIssue {
    pub key: IssueKey,
    pub id: String,
    pub summary: String,
    pub description: Option<String>,
    pub status: String,
    pub issue_type: String,
    pub assignee: Option<String>,
    pub priority: Option<String>,
    pub labels: Vec<String>,
}
