#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS snapshots (
          entity_id TEXT NOT NULL,
          side TEXT NOT NULL CHECK(side IN ('local', 'remote')),
          hash TEXT NOT NULL,
          payload_json TEXT NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY (entity_id, side)
        );

        -- conflict_state is non-null only while an entity awaits manual resolution.
        CREATE TABLE IF NOT EXISTS sync_state (
          local_id TEXT PRIMARY KEY,
          last_sync_at_ms INTEGER,
          conflict_state TEXT
        );
"#;
