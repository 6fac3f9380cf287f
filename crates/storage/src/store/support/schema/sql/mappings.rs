#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        -- 1:1 link between a local task and a remote issue.
        CREATE TABLE IF NOT EXISTS mappings (
          local_id TEXT PRIMARY KEY,
          remote_key TEXT NOT NULL UNIQUE,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );
"#;
