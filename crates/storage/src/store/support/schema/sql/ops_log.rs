#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS ops_log (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          ts_ms INTEGER NOT NULL,
          operation TEXT NOT NULL,
          local_id TEXT,
          remote_key TEXT,
          outcome TEXT NOT NULL,
          details_json TEXT
        );
"#;
