#![forbid(unsafe_code)]

use super::support::now_ms;
use super::{MappingRow, SqliteStore, StoreError, is_constraint_violation};
use rusqlite::{OptionalExtension, Row, params};
use tb_core::ids::{IssueKey, TaskId};

impl SqliteStore {
    /// Links a local task to a remote issue.
    ///
    /// Re-linking the same pair is a no-op; linking either side to something
    /// else fails with `MappingConflict`.
    pub fn mapping_link(
        &mut self,
        local_id: &TaskId,
        remote_key: &IssueKey,
    ) -> Result<MappingRow, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        let existing = tx
            .query_row(
                "SELECT local_id, remote_key, created_at_ms, updated_at_ms FROM mappings \
                 WHERE local_id=?1 OR remote_key=?2",
                params![local_id.as_str(), remote_key.as_str()],
                mapping_from_row,
            )
            .optional()?;

        if let Some(row) = existing {
            let row = row?;
            if &row.local_id == local_id && &row.remote_key == remote_key {
                return Ok(row);
            }
            return Err(StoreError::MappingConflict {
                local_id: row.local_id.into_string(),
                remote_key: row.remote_key.into_string(),
            });
        }

        let insert = tx.execute(
            "INSERT INTO mappings(local_id, remote_key, created_at_ms, updated_at_ms) \
             VALUES (?1, ?2, ?3, ?3)",
            params![local_id.as_str(), remote_key.as_str(), now_ms],
        );
        if let Err(err) = insert {
            if is_constraint_violation(&err) {
                return Err(StoreError::MappingConflict {
                    local_id: local_id.as_str().to_string(),
                    remote_key: remote_key.as_str().to_string(),
                });
            }
            return Err(err.into());
        }

        tx.commit()?;
        Ok(MappingRow {
            local_id: local_id.clone(),
            remote_key: remote_key.clone(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        })
    }

    pub fn mapping_find(&self, local_id: &TaskId) -> Result<Option<MappingRow>, StoreError> {
        self.conn
            .query_row(
                "SELECT local_id, remote_key, created_at_ms, updated_at_ms FROM mappings \
                 WHERE local_id=?1",
                params![local_id.as_str()],
                mapping_from_row,
            )
            .optional()?
            .transpose()
    }

    /// Like [`Self::mapping_find`], but an absent mapping is `UnknownMapping`.
    pub fn mapping_get(&self, local_id: &TaskId) -> Result<MappingRow, StoreError> {
        self.mapping_find(local_id)?
            .ok_or(StoreError::UnknownMapping)
    }

    pub fn mapping_find_by_remote(
        &self,
        remote_key: &IssueKey,
    ) -> Result<Option<MappingRow>, StoreError> {
        self.conn
            .query_row(
                "SELECT local_id, remote_key, created_at_ms, updated_at_ms FROM mappings \
                 WHERE remote_key=?1",
                params![remote_key.as_str()],
                mapping_from_row,
            )
            .optional()?
            .transpose()
    }

    pub fn mapping_list(&self) -> Result<Vec<MappingRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT local_id, remote_key, created_at_ms, updated_at_ms FROM mappings \
             ORDER BY local_id ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(mapping_from_row(row)??);
        }
        Ok(out)
    }

    /// Removes a mapping together with its baseline snapshots and sync state.
    pub fn mapping_unlink(&mut self, local_id: &TaskId) -> Result<MappingRow, StoreError> {
        let tx = self.conn.transaction()?;
        let row = tx
            .query_row(
                "SELECT local_id, remote_key, created_at_ms, updated_at_ms FROM mappings \
                 WHERE local_id=?1",
                params![local_id.as_str()],
                mapping_from_row,
            )
            .optional()?
            .transpose()?
            .ok_or(StoreError::UnknownMapping)?;

        tx.execute(
            "DELETE FROM snapshots WHERE entity_id=?1",
            params![local_id.as_str()],
        )?;
        tx.execute(
            "DELETE FROM sync_state WHERE local_id=?1",
            params![local_id.as_str()],
        )?;
        tx.execute(
            "DELETE FROM mappings WHERE local_id=?1",
            params![local_id.as_str()],
        )?;

        tx.commit()?;
        Ok(row)
    }
}

// Outer Result is the SQL read, inner the id validation of stored values.
fn mapping_from_row(row: &Row<'_>) -> rusqlite::Result<Result<MappingRow, StoreError>> {
    let local_id = row.get::<_, String>(0)?;
    let remote_key = row.get::<_, String>(1)?;
    let created_at_ms = row.get::<_, i64>(2)?;
    let updated_at_ms = row.get::<_, i64>(3)?;
    Ok(parse_mapping(local_id, remote_key, created_at_ms, updated_at_ms))
}

fn parse_mapping(
    local_id: String,
    remote_key: String,
    created_at_ms: i64,
    updated_at_ms: i64,
) -> Result<MappingRow, StoreError> {
    let local_id =
        TaskId::try_new(local_id)
            .map_err(|_| StoreError::InvalidInput("invalid mapping local_id"))?;
    let remote_key = IssueKey::try_new(remote_key)
        .map_err(|_| StoreError::InvalidInput("invalid mapping remote_key"))?;
    Ok(MappingRow {
        local_id,
        remote_key,
        created_at_ms,
        updated_at_ms,
    })
}
