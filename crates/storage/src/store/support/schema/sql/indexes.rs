#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE INDEX IF NOT EXISTS idx_ops_log_local_seq ON ops_log(local_id, seq);
        CREATE INDEX IF NOT EXISTS idx_sync_state_conflict ON sync_state(conflict_state);
"#;
