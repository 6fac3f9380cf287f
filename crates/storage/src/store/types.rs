#![forbid(unsafe_code)]

use serde_json::Value;
use tb_core::Side;
use tb_core::ids::{IssueKey, TaskId};
use tb_core::sync::{CanonicalPayload, ContentHash};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingRow {
    pub local_id: TaskId,
    pub remote_key: IssueKey,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotRow {
    pub entity_id: TaskId,
    pub side: Side,
    pub hash: ContentHash,
    pub payload: CanonicalPayload,
    pub updated_at_ms: i64,
}

/// The two per-side snapshots forming the 3-way baseline of one entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Baseline {
    pub local: Option<SnapshotRow>,
    pub remote: Option<SnapshotRow>,
}

impl Baseline {
    pub fn is_complete(&self) -> bool {
        self.local.is_some() && self.remote.is_some()
    }

    pub fn local_hash(&self) -> Option<&ContentHash> {
        self.local.as_ref().map(|s| &s.hash)
    }

    pub fn remote_hash(&self) -> Option<&ContentHash> {
        self.remote.as_ref().map(|s| &s.hash)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncStateRow {
    pub local_id: TaskId,
    pub last_sync_at_ms: Option<i64>,
    pub conflict_state: Option<String>,
}

/// An audit record to append; `ts_ms` and `seq` are assigned by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct OpLogEntry {
    pub operation: String,
    pub local_id: Option<TaskId>,
    pub remote_key: Option<IssueKey>,
    pub outcome: String,
    pub details: Option<Value>,
}

impl OpLogEntry {
    pub fn new(operation: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            local_id: None,
            remote_key: None,
            outcome: outcome.into(),
            details: None,
        }
    }

    pub fn for_entity(mut self, local_id: &TaskId, remote_key: Option<&IssueKey>) -> Self {
        self.local_id = Some(local_id.clone());
        self.remote_key = remote_key.cloned();
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OpLogRow {
    pub seq: i64,
    pub ts_ms: i64,
    pub operation: String,
    pub local_id: Option<String>,
    pub remote_key: Option<String>,
    pub outcome: String,
    pub details: Option<Value>,
}

impl OpLogRow {
    pub fn entry_id(&self) -> String {
        format!("op_{:016}", self.seq)
    }
}
