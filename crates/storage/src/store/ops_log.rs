#![forbid(unsafe_code)]

use super::support::now_ms;
use super::{OpLogEntry, OpLogRow, SqliteStore, StoreError, to_sqlite_i64};
use rusqlite::params;
use tb_core::ids::TaskId;

impl SqliteStore {
    /// Appends an audit entry and returns its sequence number.
    pub fn ops_log_append(&mut self, entry: &OpLogEntry) -> Result<i64, StoreError> {
        if entry.operation.trim().is_empty() {
            return Err(StoreError::InvalidInput("operation must not be empty"));
        }
        let details_json = entry
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn.execute(
            "INSERT INTO ops_log(ts_ms, operation, local_id, remote_key, outcome, details_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                now_ms(),
                entry.operation,
                entry.local_id.as_ref().map(|id| id.as_str()),
                entry.remote_key.as_ref().map(|key| key.as_str()),
                entry.outcome,
                details_json
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent entries first, optionally restricted to one task.
    pub fn ops_log_list(
        &self,
        local_id: Option<&TaskId>,
        limit: usize,
    ) -> Result<Vec<OpLogRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT seq, ts_ms, operation, local_id, remote_key, outcome, details_json
            FROM ops_log
            WHERE (?1 IS NULL OR local_id=?1)
            ORDER BY seq DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(
            params![local_id.map(|id| id.as_str()), to_sqlite_i64(limit)?],
            |row| {
                Ok((
                    OpLogRow {
                        seq: row.get(0)?,
                        ts_ms: row.get(1)?,
                        operation: row.get(2)?,
                        local_id: row.get(3)?,
                        remote_key: row.get(4)?,
                        outcome: row.get(5)?,
                        details: None,
                    },
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )?;

        let mut out = Vec::new();
        for row in rows {
            let (mut entry, details_json) = row?;
            entry.details = details_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?;
            out.push(entry);
        }
        Ok(out)
    }
}
