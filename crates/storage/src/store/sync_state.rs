#![forbid(unsafe_code)]

use super::{SqliteStore, StoreError, SyncStateRow, ensure_mapped_tx};
use rusqlite::{OptionalExtension, params};
use tb_core::ids::TaskId;

impl SqliteStore {
    pub fn sync_state_get(&self, local_id: &TaskId) -> Result<Option<SyncStateRow>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT last_sync_at_ms, conflict_state FROM sync_state WHERE local_id=?1",
                params![local_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, Option<i64>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                    ))
                },
            )
            .optional()?;
        Ok(row.map(|(last_sync_at_ms, conflict_state)| SyncStateRow {
            local_id: local_id.clone(),
            last_sync_at_ms,
            conflict_state,
        }))
    }

    /// Flags an entity as awaiting manual resolution. Snapshots are left untouched.
    pub fn sync_state_mark_conflict(
        &mut self,
        local_id: &TaskId,
        conflict_state: &str,
    ) -> Result<(), StoreError> {
        if conflict_state.trim().is_empty() {
            return Err(StoreError::InvalidInput("conflict_state must not be empty"));
        }
        let tx = self.conn.transaction()?;
        ensure_mapped_tx(&tx, local_id.as_str())?;
        tx.execute(
            "INSERT INTO sync_state(local_id, last_sync_at_ms, conflict_state) \
             VALUES (?1, NULL, ?2) \
             ON CONFLICT(local_id) DO UPDATE SET conflict_state=excluded.conflict_state",
            params![local_id.as_str(), conflict_state],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn sync_state_list_conflicts(&self) -> Result<Vec<SyncStateRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT local_id, last_sync_at_ms, conflict_state FROM sync_state \
             WHERE conflict_state IS NOT NULL ORDER BY local_id ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let local_id = TaskId::try_new(row.get::<_, String>(0)?)
                .map_err(|_| StoreError::InvalidInput("invalid sync_state local_id"))?;
            out.push(SyncStateRow {
                local_id,
                last_sync_at_ms: row.get(1)?,
                conflict_state: row.get(2)?,
            });
        }
        Ok(out)
    }
}
