#![forbid(unsafe_code)]

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("no mapping for this task")]
    UnknownMapping,
    #[error("mapping conflict (local_id={local_id}, remote_key={remote_key})")]
    MappingConflict {
        local_id: String,
        remote_key: String,
    },
    #[error("snapshot row is corrupt (entity_id={entity_id}, side={side})")]
    SnapshotCorrupt { entity_id: String, side: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownMapping)
    }
}
