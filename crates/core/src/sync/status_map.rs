#![forbid(unsafe_code)]

use super::text::normalize_line;
use serde::{Deserialize, Serialize};

/// One status name in each tracker that mean the same thing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPair {
    pub local: String,
    pub remote: String,
}

/// Maps tracker-specific status vocabularies onto the canonical (local) names.
///
/// Lookups are case-insensitive; a name without a pair passes through normalized.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusMap {
    pairs: Vec<StatusPair>,
}

impl StatusMap {
    pub fn new(pairs: Vec<StatusPair>) -> Self {
        let pairs = pairs
            .into_iter()
            .map(|p| StatusPair {
                local: normalize_line(&p.local),
                remote: normalize_line(&p.remote),
            })
            .collect();
        Self { pairs }
    }

    pub fn pairs(&self) -> &[StatusPair] {
        &self.pairs
    }

    pub fn canonical_from_local(&self, local: &str) -> String {
        let local = normalize_line(local);
        self.pairs
            .iter()
            .find(|p| p.local.eq_ignore_ascii_case(&local))
            .map(|p| p.local.clone())
            .unwrap_or(local)
    }

    pub fn canonical_from_remote(&self, remote: &str) -> String {
        let remote = normalize_line(remote);
        self.pairs
            .iter()
            .find(|p| p.remote.eq_ignore_ascii_case(&remote))
            .map(|p| p.local.clone())
            .unwrap_or(remote)
    }

    /// Remote status name to request when writing a canonical status.
    pub fn remote_name(&self, canonical: &str) -> String {
        let canonical = normalize_line(canonical);
        self.pairs
            .iter()
            .find(|p| p.local.eq_ignore_ascii_case(&canonical))
            .map(|p| p.remote.clone())
            .unwrap_or(canonical)
    }

    /// First status named by more than one pair on the same side, if any.
    pub fn first_duplicate(&self) -> Option<String> {
        for (i, pair) in self.pairs.iter().enumerate() {
            for other in &self.pairs[i + 1..] {
                if pair.local.eq_ignore_ascii_case(&other.local) {
                    return Some(pair.local.clone());
                }
                if pair.remote.eq_ignore_ascii_case(&other.remote) {
                    return Some(pair.remote.clone());
                }
            }
        }
        None
    }
}
