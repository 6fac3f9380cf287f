#![forbid(unsafe_code)]

use crate::error::SyncError;
use crate::resolver::Strategy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tb_core::ids::ProjectKey;
use tb_core::sync::{StatusMap, StatusPair};

const DEFAULT_ISSUE_TYPE: &str = "Task";
const DEFAULT_BATCH_WIDTH: usize = 10;
const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_BACKOFF_MAX_MS: u64 = 300_000;
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Engine settings. Built by the caller (usually from a YAML file); the engine
/// never reads the environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub project_key: String,
    pub issue_type: String,
    pub batch_width: usize,
    pub default_strategy: Strategy,
    pub status_map: Vec<StatusPair>,
    pub watch: WatchConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            project_key: String::new(),
            issue_type: DEFAULT_ISSUE_TYPE.to_string(),
            batch_width: DEFAULT_BATCH_WIDTH,
            default_strategy: Strategy::default(),
            status_map: Vec::new(),
            watch: WatchConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    pub interval_secs: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub failure_threshold: u32,
    pub stop_on_error: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            stop_on_error: false,
        }
    }
}

impl SyncConfig {
    pub fn for_project(project_key: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, SyncError> {
        let config: SyncConfig = serde_yaml::from_str(raw)
            .map_err(|err| SyncError::Validation(format!("config must be valid YAML: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            SyncError::Validation(format!("cannot read config {}: {err}", path.display()))
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Rejects settings no sync run could work with. Called before any entity is touched.
    pub fn validate(&self) -> Result<(), SyncError> {
        self.project()?;
        if self.issue_type.trim().is_empty() {
            return Err(SyncError::Validation("issue_type must not be empty".to_string()));
        }
        if self.batch_width == 0 {
            return Err(SyncError::Validation("batch_width must be at least 1".to_string()));
        }
        if let Some(name) = self.statuses().first_duplicate() {
            return Err(SyncError::Validation(format!(
                "status_map names {name:?} more than once"
            )));
        }
        if self
            .status_map
            .iter()
            .any(|p| p.local.trim().is_empty() || p.remote.trim().is_empty())
        {
            return Err(SyncError::Validation(
                "status_map entries need both local and remote names".to_string(),
            ));
        }

        let watch = &self.watch;
        if watch.interval_secs == 0 {
            return Err(SyncError::Validation("watch.interval_secs must be positive".to_string()));
        }
        if watch.backoff_base_ms == 0 || watch.backoff_base_ms > watch.backoff_max_ms {
            return Err(SyncError::Validation(
                "watch backoff needs 0 < backoff_base_ms <= backoff_max_ms".to_string(),
            ));
        }
        if watch.failure_threshold == 0 {
            return Err(SyncError::Validation(
                "watch.failure_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn project(&self) -> Result<ProjectKey, SyncError> {
        if self.project_key.trim().is_empty() {
            return Err(SyncError::Validation("project_key is required".to_string()));
        }
        ProjectKey::try_new(self.project_key.as_str())
            .map_err(|err| SyncError::Validation(format!("project_key: {err}")))
    }

    pub fn statuses(&self) -> StatusMap {
        StatusMap::new(self.status_map.clone())
    }
}
