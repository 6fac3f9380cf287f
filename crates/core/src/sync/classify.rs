#![forbid(unsafe_code)]

use super::canonical::ContentHash;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    InSync,
    NeedsPush,
    NeedsPull,
    Conflict,
    Unknown,
}

impl SyncState {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncState::InSync => "in_sync",
            SyncState::NeedsPush => "needs_push",
            SyncState::NeedsPull => "needs_pull",
            SyncState::Conflict => "conflict",
            SyncState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives the sync state from current hashes against the persisted baselines.
///
/// A missing baseline on either side yields `Unknown`: baselines are only ever
/// written as a pair, so a lone one cannot be trusted. Both sides diverging is
/// `Conflict` even when they converged on the same value.
pub fn classify(
    local: &ContentHash,
    remote: &ContentHash,
    baseline_local: Option<&ContentHash>,
    baseline_remote: Option<&ContentHash>,
) -> SyncState {
    let (Some(baseline_local), Some(baseline_remote)) = (baseline_local, baseline_remote) else {
        return SyncState::Unknown;
    };
    let local_changed = local != baseline_local;
    let remote_changed = remote != baseline_remote;
    match (local_changed, remote_changed) {
        (false, false) => SyncState::InSync,
        (true, false) => SyncState::NeedsPush,
        (false, true) => SyncState::NeedsPull,
        (true, true) => SyncState::Conflict,
    }
}
