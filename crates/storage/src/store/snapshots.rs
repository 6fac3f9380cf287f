#![forbid(unsafe_code)]

use super::support::now_ms;
use super::{Baseline, SnapshotRow, SqliteStore, StoreError, ensure_mapped_tx};
use rusqlite::{Connection, OptionalExtension, params};
use tb_core::Side;
use tb_core::ids::TaskId;
use tb_core::sync::{CanonicalPayload, ContentHash};

impl SqliteStore {
    pub fn snapshot_get(
        &self,
        entity_id: &TaskId,
        side: Side,
    ) -> Result<Option<SnapshotRow>, StoreError> {
        snapshot_get_tx(&self.conn, entity_id, side)
    }

    pub fn baseline_get(&self, entity_id: &TaskId) -> Result<Baseline, StoreError> {
        Ok(Baseline {
            local: snapshot_get_tx(&self.conn, entity_id, Side::Local)?,
            remote: snapshot_get_tx(&self.conn, entity_id, Side::Remote)?,
        })
    }

    /// Overwrites one side's snapshot (last write wins). The entity must be mapped.
    pub fn snapshot_set(
        &mut self,
        entity_id: &TaskId,
        side: Side,
        payload: &CanonicalPayload,
    ) -> Result<SnapshotRow, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        ensure_mapped_tx(&tx, entity_id.as_str())?;
        let row = snapshot_put_tx(&tx, entity_id, side, payload, now_ms)?;
        tx.commit()?;
        Ok(row)
    }

    /// Records both sides as synced in one transaction and clears any pending conflict.
    ///
    /// Either both snapshots and the sync state are written, or none are.
    pub fn baseline_commit(
        &mut self,
        entity_id: &TaskId,
        local: &CanonicalPayload,
        remote: &CanonicalPayload,
    ) -> Result<Baseline, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        ensure_mapped_tx(&tx, entity_id.as_str())?;

        let local = snapshot_put_tx(&tx, entity_id, Side::Local, local, now_ms)?;
        let remote = snapshot_put_tx(&tx, entity_id, Side::Remote, remote, now_ms)?;
        tx.execute(
            "INSERT INTO sync_state(local_id, last_sync_at_ms, conflict_state) \
             VALUES (?1, ?2, NULL) \
             ON CONFLICT(local_id) DO UPDATE SET \
             last_sync_at_ms=excluded.last_sync_at_ms, conflict_state=NULL",
            params![entity_id.as_str(), now_ms],
        )?;
        tx.execute(
            "UPDATE mappings SET updated_at_ms=?2 WHERE local_id=?1",
            params![entity_id.as_str(), now_ms],
        )?;

        tx.commit()?;
        Ok(Baseline {
            local: Some(local),
            remote: Some(remote),
        })
    }
}

fn snapshot_put_tx(
    conn: &Connection,
    entity_id: &TaskId,
    side: Side,
    payload: &CanonicalPayload,
    now_ms: i64,
) -> Result<SnapshotRow, StoreError> {
    let hash = payload.hash();
    let payload_json = serde_json::to_string(payload)?;
    conn.execute(
        "INSERT INTO snapshots(entity_id, side, hash, payload_json, updated_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(entity_id, side) DO UPDATE SET hash=excluded.hash, \
         payload_json=excluded.payload_json, updated_at_ms=excluded.updated_at_ms",
        params![
            entity_id.as_str(),
            side.as_str(),
            hash.as_str(),
            payload_json,
            now_ms
        ],
    )?;
    Ok(SnapshotRow {
        entity_id: entity_id.clone(),
        side,
        hash,
        payload: payload.clone(),
        updated_at_ms: now_ms,
    })
}

fn snapshot_get_tx(
    conn: &Connection,
    entity_id: &TaskId,
    side: Side,
) -> Result<Option<SnapshotRow>, StoreError> {
    let row = conn
        .query_row(
            "SELECT hash, payload_json, updated_at_ms FROM snapshots \
             WHERE entity_id=?1 AND side=?2",
            params![entity_id.as_str(), side.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((hash, payload_json, updated_at_ms)) = row else {
        return Ok(None);
    };

    let corrupt = || StoreError::SnapshotCorrupt {
        entity_id: entity_id.as_str().to_string(),
        side: side.as_str().to_string(),
    };
    let hash = ContentHash::from_hex(hash).ok_or_else(corrupt)?;
    let payload: CanonicalPayload = serde_json::from_str(&payload_json).map_err(|_| corrupt())?;

    Ok(Some(SnapshotRow {
        entity_id: entity_id.clone(),
        side,
        hash,
        payload,
        updated_at_ms,
    }))
}
